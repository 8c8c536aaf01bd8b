//! Configuration settings for the paydb client.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::ApiKey;
use crate::error::ClientError;

/// Main configuration structure for the client.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Remote API endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL that REST endpoint names are appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Socket server URL (`ws`, `wss`, `http` or `https`).
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// Socket.IO namespace of the ledger channel.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// API key configuration.
///
/// Exactly one of `secret` and `secret_path` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Public API key token.
    pub token: String,
    /// Inline shared secret.
    pub secret: Option<String>,
    /// File holding the shared secret (owner-only permissions).
    pub secret_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Push notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Service account JSON, inline or as a path ending in `.json`.
    pub firebase_credentials: Option<String>,
    /// FCM HTTP v1 base URL.
    #[serde(default = "default_messaging_url")]
    pub messaging_url: String,
    /// Instance ID API base URL, used for topic subscriptions.
    #[serde(default = "default_iid_url")]
    pub iid_url: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5000/paydb".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:5000/".to_string()
}

fn default_namespace() -> String {
    "/paydb".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_messaging_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_iid_url() -> String {
    "https://iid.googleapis.com".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            socket_url: default_socket_url(),
            namespace: default_namespace(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            firebase_credentials: None,
            messaging_url: default_messaging_url(),
            iid_url: default_iid_url(),
        }
    }
}

impl CredentialsConfig {
    /// Resolve the configured credentials into an API key.
    pub fn api_key(&self) -> Result<ApiKey, ClientError> {
        let secret = match (&self.secret, &self.secret_path) {
            (Some(secret), None) => secret.as_bytes().to_vec(),
            (None, Some(path)) => ApiKey::load_secret(path)?,
            _ => {
                return Err(ClientError::Config {
                    message: "credentials need exactly one of 'secret' or 'secret_path'"
                        .to_string(),
                })
            }
        };
        Ok(ApiKey::new(self.token.clone(), secret))
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ClientError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ClientError::Config { message } => ClientError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ClientError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ClientError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ClientError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ClientError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ClientError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !has_scheme(&self.api.base_url, &["http", "https"]) {
            return Err(ClientError::Config {
                message: format!(
                    "Invalid base URL '{}'. Must start with http:// or https://",
                    self.api.base_url
                ),
            });
        }

        if !has_scheme(&self.api.socket_url, &["ws", "wss", "http", "https"]) {
            return Err(ClientError::Config {
                message: format!(
                    "Invalid socket URL '{}'. Must start with ws://, wss://, http:// or https://",
                    self.api.socket_url
                ),
            });
        }

        if !self.api.namespace.starts_with('/') {
            return Err(ClientError::Config {
                message: format!(
                    "Invalid namespace '{}'. Must start with '/'",
                    self.api.namespace
                ),
            });
        }

        if let Some(credentials) = &self.credentials {
            if credentials.secret.is_some() == credentials.secret_path.is_some() {
                return Err(ClientError::Config {
                    message: "credentials need exactly one of 'secret' or 'secret_path'"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.starts_with(&format!("{}://", scheme)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:5000/paydb");
        assert_eq!(settings.api.socket_url, "ws://localhost:5000/");
        assert_eq!(settings.api.namespace, "/paydb");
        assert_eq!(settings.logging.level, "info");
        assert!(settings.credentials.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.api.timeout_seconds, 30);
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn test_full_config() {
        let settings = Settings::from_toml(
            r#"
            [api]
            base_url = "https://ledger.example.com/paydb"
            socket_url = "wss://ledger.example.com/"

            [credentials]
            token = "tok1"
            secret = "s3cr3t"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.api.namespace, "/paydb");
        let key = settings.credentials.unwrap().api_key().unwrap();
        assert_eq!(key.token(), "tok1");
    }

    #[test]
    fn test_invalid_log_level() {
        let result = Settings::from_toml("[logging]\nlevel = \"loud\"");
        assert!(matches!(result, Err(ClientError::Config { .. })));
    }

    #[test]
    fn test_invalid_urls() {
        assert!(Settings::from_toml("[api]\nbase_url = \"localhost:5000\"").is_err());
        assert!(Settings::from_toml("[api]\nsocket_url = \"tcp://localhost\"").is_err());
        assert!(Settings::from_toml("[api]\nnamespace = \"paydb\"").is_err());
    }

    #[test]
    fn test_credentials_need_one_secret() {
        let both = "[credentials]\ntoken = \"t\"\nsecret = \"s\"\nsecret_path = \"/tmp/s\"";
        assert!(Settings::from_toml(both).is_err());

        let neither = "[credentials]\ntoken = \"t\"";
        assert!(Settings::from_toml(neither).is_err());
    }

    #[test]
    fn test_load_from_file_with_secret_path() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("api.secret");
        std::fs::write(&secret_path, "s3cr3t\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&secret_path, std::fs::Permissions::from_mode(0o600))
                .unwrap();
        }

        let config_path = dir.path().join("client.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "[credentials]").unwrap();
        writeln!(file, "token = \"tok1\"").unwrap();
        writeln!(file, "secret_path = {:?}", secret_path.to_str().unwrap()).unwrap();
        drop(file);

        let settings = Settings::load(&config_path).unwrap();
        let key = settings.credentials.unwrap().api_key().unwrap();
        assert_eq!(key.token(), "tok1");
        assert_eq!(
            key.signer().unwrap().sign(b"1700000000"),
            "e9a04b295550530d7a3ffd02fbca6cf7cc859115f4c5bc624fd76d03236fad10"
        );
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[logging]\nlevel = \"loud\"").unwrap();

        let err = Settings::load(&path).unwrap_err().to_string();
        assert!(err.contains("bad.toml"));
        assert!(err.contains("loud"));

        assert!(Settings::load(dir.path().join("missing.toml")).is_err());
    }
}
