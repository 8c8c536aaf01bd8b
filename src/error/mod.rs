//! Error types for the paydb client.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
