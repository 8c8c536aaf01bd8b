//! paydb client library
//!
//! Signs REST calls and socket sessions for the paydb ledger API with an
//! HMAC-SHA256 API key scheme, and wraps push notification delivery.

pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod rest;
pub mod socket;
