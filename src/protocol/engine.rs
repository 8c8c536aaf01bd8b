//! Engine.IO v4 packet framing.
//!
//! Packets are a one-digit type followed by string data. The polling
//! transport batches packets in one HTTP body separated by `\x1e`:
//! ```text
//! 2\x1e42/paydb,["info",{}]
//! ```

use serde::Deserialize;

use crate::error::ClientError;

/// Separator between packets in a polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Engine.IO protocol revision spoken by the client.
pub const ENGINE_IO_VERSION: u8 = 4;

/// A single Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Encode to the text form.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    /// Decode a single packet.
    pub fn decode(text: &str) -> Result<Self, ClientError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::invalid_packet("empty engine packet"))?;
        let data = chars.as_str().to_string();

        match kind {
            '0' => Ok(EnginePacket::Open(data)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data)),
            '3' => Ok(EnginePacket::Pong(data)),
            '4' => Ok(EnginePacket::Message(data)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(ClientError::invalid_packet(
                "binary engine packets are not supported",
            )),
            other => Err(ClientError::invalid_packet(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }
}

/// Join packets into a polling payload.
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// Split a polling payload into packets.
pub fn decode_payload(payload: &str) -> Result<Vec<EnginePacket>, ClientError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    payload
        .split(RECORD_SEPARATOR)
        .map(EnginePacket::decode)
        .collect()
}

/// Data carried by the server's `open` packet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session id.
    pub sid: String,

    /// Transports the server allows upgrading to.
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Server ping interval in milliseconds.
    pub ping_interval: u64,

    /// How long the server waits for a pong, in milliseconds.
    pub ping_timeout: u64,

    /// Maximum payload size the server accepts.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Parse the data of an `open` packet.
    pub fn parse(data: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(data)?)
    }
}
