//! Error types for the paydb client.

use thiserror::Error;

/// Main error type for the client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Authentication errors raised while signing.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// The server answered with a non-success status.
    #[error("Request failed: {status} - {url}\n{body}")]
    Request {
        status: u16,
        url: String,
        body: String,
    },

    /// Socket session errors.
    #[error("Session error: {kind}")]
    Session { kind: SessionErrorKind },

    /// Push notification errors.
    #[error("Notification error: {kind}")]
    Notification { kind: NotificationErrorKind },

    /// HTTP transport errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Shared secret must not be empty")]
    EmptySecret,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("System clock error: {message}")]
    Clock { message: String },

    #[error("Failed to read API key secret: {message}")]
    SecretFile { message: String },

    #[error("No API key configured")]
    MissingApiKey,
}

/// Socket session error kinds.
#[derive(Error, Debug)]
pub enum SessionErrorKind {
    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("Transport handshake failed: {message}")]
    Handshake { message: String },

    #[error("Namespace {namespace} rejected the connection: {message}")]
    ConnectRejected { namespace: String, message: String },

    #[error("Session closed before authentication")]
    ClosedBeforeAuth,
}

/// Notification error kinds.
#[derive(Error, Debug)]
pub enum NotificationErrorKind {
    #[error("Invalid notification credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Access token exchange failed: {message}")]
    TokenExchange { message: String },

    #[error("Delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("Notifications are disabled")]
    Disabled,
}

impl ClientError {
    /// Build an invalid-packet session error.
    pub(crate) fn invalid_packet(message: impl Into<String>) -> Self {
        ClientError::Session {
            kind: SessionErrorKind::InvalidPacket {
                message: message.into(),
            },
        }
    }

    /// The HTTP status carried by a failed request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            ClientError::Notification {
                kind: NotificationErrorKind::Delivery { status, .. },
            } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
