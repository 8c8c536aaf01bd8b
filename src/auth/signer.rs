//! HMAC-SHA256 message signing.

use ring::hmac;

use crate::error::{AuthErrorKind, ClientError};

/// Sign `message` with `secret` and return the lowercase hex MAC.
pub fn sign(secret: &[u8], message: &[u8]) -> Result<String, ClientError> {
    Ok(Signer::new(secret)?.sign(message))
}

/// HMAC-SHA256 signer holding a prepared key.
///
/// Signing is pure, so a single signer can be shared across tasks.
pub struct Signer {
    key: hmac::Key,
}

impl Signer {
    /// Create a signer for the given shared secret.
    pub fn new(secret: &[u8]) -> Result<Self, ClientError> {
        if secret.is_empty() {
            return Err(ClientError::Auth {
                kind: AuthErrorKind::EmptySecret,
            });
        }

        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }

    /// Compute the hex-encoded MAC of `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        let tag = hmac::sign(&self.key, message);
        hex::encode(tag.as_ref())
    }

    /// Verify a hex-encoded MAC the way the server does.
    ///
    /// The comparison is constant-time.
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<(), ClientError> {
        let signature_bytes = hex::decode(signature).map_err(|_| ClientError::Auth {
            kind: AuthErrorKind::InvalidSignature,
        })?;

        hmac::verify(&self.key, message, &signature_bytes).map_err(|_| ClientError::Auth {
            kind: AuthErrorKind::InvalidSignature,
        })
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}
