//! Engine.IO long-polling transport over HTTP.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult, SessionErrorKind};
use crate::protocol::{
    decode_payload, encode_payload, EnginePacket, OpenHandshake, ENGINE_IO_VERSION,
};

use super::Transport;

/// Path the Socket.IO server is mounted on.
const SOCKET_IO_PATH: &str = "socket.io/";

/// Extra time allowed on top of the server's ping interval for a poll.
const POLL_GRACE: Duration = Duration::from_secs(5);

/// Long-polling transport.
///
/// Each `poll` is a GET that the server holds open until it has packets to
/// deliver; each `send` is a POST.
pub struct PollingTransport {
    http: reqwest::Client,
    endpoint: String,
    sid: Option<String>,
    poll_timeout: Option<Duration>,
    pending: VecDeque<EnginePacket>,
}

impl PollingTransport {
    /// Create a transport for a socket server URL such as `ws://host:5000/`.
    pub fn new(socket_url: &str) -> ClientResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: polling_endpoint(socket_url)?,
            sid: None,
            poll_timeout: None,
            pending: VecDeque::new(),
        })
    }

    /// The polling endpoint in use.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self) -> String {
        let mut url = format!(
            "{}?EIO={}&transport=polling&t={}",
            self.endpoint,
            ENGINE_IO_VERSION,
            Uuid::new_v4().simple()
        );
        if let Some(sid) = &self.sid {
            url.push_str("&sid=");
            url.push_str(sid);
        }
        url
    }

    fn require_sid(&self) -> ClientResult<()> {
        if self.sid.is_none() {
            return Err(ClientError::Session {
                kind: SessionErrorKind::Handshake {
                    message: "transport is not open".to_string(),
                },
            });
        }
        Ok(())
    }

    async fn get_payload(&self) -> ClientResult<String> {
        let url = self.url();
        let mut request = self.http.get(&url);
        if let Some(timeout) = self.poll_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        read_body(response).await
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn open(&mut self) -> ClientResult<OpenHandshake> {
        self.sid = None;
        self.pending.clear();

        let payload = self.get_payload().await?;
        let mut packets: VecDeque<EnginePacket> = decode_payload(&payload)?.into();

        let handshake = match packets.pop_front() {
            Some(EnginePacket::Open(data)) => OpenHandshake::parse(&data)?,
            other => {
                return Err(ClientError::Session {
                    kind: SessionErrorKind::Handshake {
                        message: format!("expected open packet, got {:?}", other),
                    },
                })
            }
        };

        debug!(
            sid = %handshake.sid,
            ping_interval_ms = handshake.ping_interval,
            ping_timeout_ms = handshake.ping_timeout,
            "Polling transport opened"
        );

        self.sid = Some(handshake.sid.clone());
        self.poll_timeout = Some(
            Duration::from_millis(handshake.ping_interval + handshake.ping_timeout) + POLL_GRACE,
        );
        self.pending = packets;

        Ok(handshake)
    }

    async fn send(&mut self, packets: Vec<EnginePacket>) -> ClientResult<()> {
        self.require_sid()?;
        if packets.is_empty() {
            return Ok(());
        }

        let body = encode_payload(&packets);
        trace!(packets = packets.len(), "Posting payload");

        let response = self
            .http
            .post(self.url())
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    async fn poll(&mut self) -> ClientResult<Vec<EnginePacket>> {
        self.require_sid()?;
        if !self.pending.is_empty() {
            return Ok(self.pending.drain(..).collect());
        }

        let payload = self.get_payload().await?;
        let packets = decode_payload(&payload)?;
        trace!(packets = packets.len(), "Poll returned");
        Ok(packets)
    }

    async fn close(&mut self) -> ClientResult<()> {
        if self.sid.is_none() {
            return Ok(());
        }
        let result = self.send(vec![EnginePacket::Close]).await;
        self.sid = None;
        self.poll_timeout = None;
        result
    }
}

async fn read_body(response: reqwest::Response) -> ClientResult<String> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Request {
            status: status.as_u16(),
            url,
            body,
        });
    }
    Ok(body)
}

/// Map a socket server URL to its Engine.IO polling endpoint.
///
/// `ws://` and `wss://` become `http://` and `https://`; the path gets
/// `/socket.io/` appended.
pub fn polling_endpoint(socket_url: &str) -> ClientResult<String> {
    let http_url = if let Some(rest) = socket_url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = socket_url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if socket_url.starts_with("http://") || socket_url.starts_with("https://") {
        socket_url.to_string()
    } else {
        return Err(ClientError::Config {
            message: format!("Unsupported socket URL scheme: {}", socket_url),
        });
    };

    Ok(format!(
        "{}/{}",
        http_url.trim_end_matches('/'),
        SOCKET_IO_PATH
    ))
}
