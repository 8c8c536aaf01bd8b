//! Push notification module.
//!
//! A sender is an owned object handed to whoever needs it; there is no
//! process-wide client.

mod credentials;
mod fcm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::NotificationsConfig;
use crate::error::{ClientError, ClientResult, NotificationErrorKind};

pub use credentials::ServiceAccount;
pub use fcm::FcmSender;

/// Notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Delivers push notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send to a single device registration token.
    async fn send_to_token(
        &self,
        registration_token: &str,
        notification: &Notification,
    ) -> ClientResult<()>;

    /// Send to every device subscribed to `topic`.
    async fn send_to_topic(&self, topic: &str, notification: &Notification) -> ClientResult<()>;

    /// Subscribe a device to each of `topics`.
    async fn subscribe_to_topics(
        &self,
        registration_token: &str,
        topics: &[String],
    ) -> ClientResult<()>;
}

/// Build the configured sender, or `None` if notifications are unavailable.
///
/// Bad credentials are logged and disable notifications rather than
/// failing the caller.
pub fn load_sender(config: &NotificationsConfig) -> Option<FcmSender> {
    match FcmSender::from_config(config) {
        Ok(sender) => Some(sender),
        Err(ClientError::Notification {
            kind: NotificationErrorKind::Disabled,
        }) => {
            debug!("No firebase credentials configured, notifications disabled");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to load firebase credentials, notifications disabled");
            None
        }
    }
}
