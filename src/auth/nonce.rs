//! Freshness nonces for signed operations.
//!
//! A nonce is the current Unix time in whole seconds. Two calls inside the
//! same second get the same value; the server's replay window decides whether
//! that is acceptable; the client does not serialize nonce generation.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AuthErrorKind, ClientError};

/// Source of nonces for signed requests and socket handshakes.
pub trait NonceSource: Send + Sync {
    /// Produce the nonce for the next signed operation.
    fn next_nonce(&self) -> Result<u64, ClientError>;
}

/// Wall-clock nonce source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl NonceSource for SystemClock {
    fn next_nonce(&self) -> Result<u64, ClientError> {
        unix_now()
    }
}

/// A nonce source that always returns the same value.
///
/// Useful for reproducing a signature captured from a server log.
#[derive(Debug, Clone, Copy)]
pub struct FixedNonce(pub u64);

impl NonceSource for FixedNonce {
    fn next_nonce(&self) -> Result<u64, ClientError> {
        Ok(self.0)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, ClientError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| ClientError::Auth {
            kind: AuthErrorKind::Clock {
                message: e.to_string(),
            },
        })
}
