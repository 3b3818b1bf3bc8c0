//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the Parley gateway:
//! conversation content, session records, generation parameters, and the
//! error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! and base64 for inline binary payloads.

pub mod config;
pub mod content;
pub mod error;
pub mod generation;
pub mod session;
