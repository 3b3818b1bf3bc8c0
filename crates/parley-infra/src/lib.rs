//! Infrastructure layer for Parley.
//!
//! Contains implementations of the ports defined in `parley-core`:
//! the SQLite session store and the Gemini generation engine, plus
//! configuration loading.

pub mod config;
pub mod gemini;
pub mod sqlite;
