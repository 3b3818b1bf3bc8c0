//! Gemini generation engine adapter.
//!
//! Implements the `GenerationEngine` port against the Google Generative
//! Language API: JSON `generateContent` for complete turns and SSE
//! `streamGenerateContent` for incremental output.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::GeminiEngine;
