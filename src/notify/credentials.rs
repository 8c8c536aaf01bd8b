//! Firebase service account credentials.

use std::fmt;
use std::path::Path;

use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use tracing::info;

use crate::error::{ClientError, ClientResult, NotificationErrorKind};

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// A Google service account key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    /// Load credentials from a `.json` file path or from inline JSON.
    pub fn load(source: &str) -> ClientResult<Self> {
        if source.trim_end().ends_with(".json") {
            let path = Path::new(source.trim_end());
            info!(path = %path.display(), "Loading firebase credentials from file");
            let content = std::fs::read_to_string(path).map_err(|e| {
                invalid(format!(
                    "failed to read credentials file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_json(&content)
        } else {
            info!("Loading firebase credentials from inline JSON");
            Self::from_json(source)
        }
    }

    /// Parse service account JSON and check the private key.
    pub fn from_json(text: &str) -> ClientResult<Self> {
        let account: ServiceAccount = serde_json::from_str(text)
            .map_err(|e| invalid(format!("credentials failed to load from json: {}", e)))?;
        account.encoding_key()?;
        Ok(account)
    }

    /// The RSA key used to sign OAuth2 assertions.
    pub(crate) fn encoding_key(&self) -> ClientResult<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| invalid(format!("invalid private key: {}", e)))
    }
}

fn invalid(message: String) -> ClientError {
    ClientError::Notification {
        kind: NotificationErrorKind::InvalidCredentials { message },
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
