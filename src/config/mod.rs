//! Configuration module for the paydb client.
//!
//! Handles loading and validating client configuration from TOML files.

mod settings;

pub use settings::*;
