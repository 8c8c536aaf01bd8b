//! API key material.

use std::fmt;
use std::path::Path;

use crate::error::{AuthErrorKind, ClientError};

use super::Signer;

/// An API key: a public token plus the shared secret it signs with.
///
/// The secret never leaves the process; only the token and signatures
/// derived from the secret are transmitted.
#[derive(Clone)]
pub struct ApiKey {
    token: String,
    secret: Vec<u8>,
}

impl ApiKey {
    /// Create an API key from its token and secret.
    pub fn new(token: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }

    /// The public token sent alongside every authenticated request.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Build a signer for this key's secret.
    pub fn signer(&self) -> Result<Signer, ClientError> {
        Signer::new(&self.secret)
    }

    /// Load an API key secret from a file.
    ///
    /// The file must only be accessible by its owner (0600 or 0400).
    /// A single trailing newline is stripped.
    pub fn load_secret(path: &Path) -> Result<Vec<u8>, ClientError> {
        let metadata = std::fs::metadata(path).map_err(|e| ClientError::Auth {
            kind: AuthErrorKind::SecretFile {
                message: format!(
                    "Failed to read secret metadata from {}: {}",
                    path.display(),
                    e
                ),
            },
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(ClientError::Auth {
                    kind: AuthErrorKind::SecretFile {
                        message: format!(
                            "Secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                            path.display(),
                            mode & 0o777
                        ),
                    },
                });
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        let mut secret = std::fs::read(path).map_err(|e| ClientError::Auth {
            kind: AuthErrorKind::SecretFile {
                message: format!("Failed to read secret from {}: {}", path.display(), e),
            },
        })?;

        if secret.last() == Some(&b'\n') {
            secret.pop();
            if secret.last() == Some(&b'\r') {
                secret.pop();
            }
        }

        Ok(secret)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}
