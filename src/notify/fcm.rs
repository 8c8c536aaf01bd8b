//! Firebase Cloud Messaging sender (HTTP v1 API).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::NotificationsConfig;
use crate::error::{ClientError, ClientResult, NotificationErrorKind};

use super::{Notification, NotificationSender, ServiceAccount};

/// OAuth2 scope for sending messages.
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Lifetime requested for assertions, in seconds.
const ASSERTION_LIFETIME: i64 = 3600;

/// Refresh the access token this many seconds before it expires.
const REFRESH_MARGIN: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

/// FCM sender owning its credentials and access token.
pub struct FcmSender {
    http: reqwest::Client,
    account: ServiceAccount,
    signing_key: EncodingKey,
    messaging_url: String,
    iid_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl FcmSender {
    /// Create a sender for a service account, using Google's endpoints.
    pub fn new(account: ServiceAccount) -> ClientResult<Self> {
        let defaults = NotificationsConfig::default();
        let signing_key = account.encoding_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        info!(project_id = %account.project_id, "Firebase sender initialized");

        Ok(Self {
            http,
            account,
            signing_key,
            messaging_url: defaults.messaging_url,
            iid_url: defaults.iid_url,
            token: Mutex::new(None),
        })
    }

    /// Create a sender from configuration.
    ///
    /// Fails with `Disabled` when no credentials are configured.
    pub fn from_config(config: &NotificationsConfig) -> ClientResult<Self> {
        let source = config
            .firebase_credentials
            .as_deref()
            .ok_or(ClientError::Notification {
                kind: NotificationErrorKind::Disabled,
            })?;
        let account = ServiceAccount::load(source)?;
        Ok(Self::new(account)?.with_endpoints(&config.messaging_url, &config.iid_url))
    }

    /// Override the messaging and Instance ID base URLs.
    pub fn with_endpoints(mut self, messaging_url: &str, iid_url: &str) -> Self {
        self.messaging_url = messaging_url.trim_end_matches('/').to_string();
        self.iid_url = iid_url.trim_end_matches('/').to_string();
        self
    }

    /// Project messages are sent under.
    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    fn assertion(&self, now: i64) -> ClientResult<String> {
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.account.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.signing_key).map_err(|e| {
            ClientError::Notification {
                kind: NotificationErrorKind::TokenExchange {
                    message: format!("failed to sign assertion: {}", e),
                },
            }
        })
    }

    async fn access_token(&self) -> ClientResult<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - REFRESH_MARGIN > now {
                return Ok(token.value.clone());
            }
        }

        debug!(token_uri = %self.account.token_uri, "Requesting access token");
        let assertion = self.assertion(now)?;
        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Notification {
                kind: NotificationErrorKind::TokenExchange {
                    message: format!("{}: {}", status.as_u16(), body),
                },
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Notification {
                kind: NotificationErrorKind::TokenExchange {
                    message: format!("invalid token response: {}", e),
                },
            })?;

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        });
        Ok(value)
    }

    async fn post_json(&self, url: &str, body: &Value, iid: bool) -> ClientResult<(u16, String)> {
        let token = self.access_token().await?;
        let mut request = self.http.post(url).bearer_auth(token).json(body);
        if iid {
            request = request.header("access_token_auth", "true");
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Notification {
                kind: NotificationErrorKind::Delivery {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }
        Ok((status.as_u16(), text))
    }

    async fn send_message(
        &self,
        target_kind: &str,
        target_value: &str,
        notification: &Notification,
    ) -> ClientResult<()> {
        let mut message = serde_json::Map::new();
        message.insert(target_kind.to_string(), Value::from(target_value));
        message.insert("notification".to_string(), serde_json::to_value(notification)?);

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.messaging_url, self.account.project_id
        );
        let (_, response) = self
            .post_json(&url, &json!({ "message": message }), false)
            .await?;

        debug!(kind = target_kind, response = %response, "Notification sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for FcmSender {
    async fn send_to_token(
        &self,
        registration_token: &str,
        notification: &Notification,
    ) -> ClientResult<()> {
        self.send_message("token", registration_token, notification)
            .await
    }

    async fn send_to_topic(&self, topic: &str, notification: &Notification) -> ClientResult<()> {
        self.send_message("topic", topic, notification).await
    }

    async fn subscribe_to_topics(
        &self,
        registration_token: &str,
        topics: &[String],
    ) -> ClientResult<()> {
        let url = format!("{}/iid/v1:batchAdd", self.iid_url);

        for topic in topics {
            let body = json!({
                "to": format!("/topics/{}", topic.trim_start_matches("/topics/")),
                "registration_tokens": [registration_token],
            });
            let (status, response) = self.post_json(&url, &body, true).await?;

            let failures = serde_json::from_str::<Value>(&response)
                .ok()
                .and_then(|v| v.get("results").and_then(Value::as_array).cloned())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|r| r.get("error").and_then(Value::as_str).map(str::to_string))
                .collect::<Vec<_>>();

            // batchAdd answers 200 even when the token was rejected.
            if !failures.is_empty() {
                warn!(topic = %topic, errors = ?failures, "Topic subscription rejected");
                return Err(ClientError::Notification {
                    kind: NotificationErrorKind::Delivery {
                        status,
                        body: format!("topic '{}': {}", topic, failures.join(", ")),
                    },
                });
            }
            debug!(topic = %topic, "Subscribed to topic");
        }

        Ok(())
    }
}
