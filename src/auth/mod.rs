//! Authentication module.
//!
//! Handles API key material, HMAC signing and nonce generation.

mod api_key;
mod nonce;
mod signer;

pub use api_key::ApiKey;
pub use nonce::{unix_now, FixedNonce, NonceSource, SystemClock};
pub use signer::{sign, Signer};
