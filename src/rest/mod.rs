//! REST module.
//!
//! Sends signed and unsigned calls to the ledger API.

mod client;
mod endpoints;

pub use client::{ApiResponse, RestClient};
