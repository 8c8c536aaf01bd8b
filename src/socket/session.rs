//! Authenticated socket session.
//!
//! The session connects to a namespace, emits the `auth` event as soon as
//! the namespace connect is acknowledged, then forwards server events to the
//! caller until either side disconnects. Events that request an ack are
//! acknowledged with no arguments.
//!
//! ```text
//! Connecting --namespace connected / auth emitted--> AuthSent
//! Connecting --connect error / transport failure--> Closed
//! AuthSent   --disconnect (either peer)-----------> Closed
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tracing::{debug, info, warn};

use crate::auth::{ApiKey, NonceSource, SystemClock};
use crate::config::ApiConfig;
use crate::error::{ClientError, ClientResult, SessionErrorKind};
use crate::protocol::{EnginePacket, SocketPacket};

use super::{AuthPayload, PollingTransport, Transport};

/// Server event carrying informational pushes.
pub const INFO_EVENT: &str = "info";

/// Server event carrying transaction notifications.
pub const TX_EVENT: &str = "tx";

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AuthSent,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed the namespace or the transport.
    Server,
    /// The client asked to close.
    Client,
    /// The transport or protocol failed.
    Error(String),
}

/// Something that happened on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The namespace connect was acknowledged.
    Connected,
    /// An `info` push.
    Info(Value),
    /// A `tx` push.
    Transaction(Value),
    /// Any other named event.
    Other { name: String, args: Vec<Value> },
    /// The session ended.
    Disconnected(DisconnectReason),
}

/// Drives one socket session.
pub struct Session<T: Transport> {
    transport: T,
    namespace: String,
    api_key: ApiKey,
    nonces: Arc<dyn NonceSource>,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    auth_signal: Option<oneshot::Sender<()>>,
    shutdown: Arc<Notify>,
}

/// Caller side of a session: state, events and shutdown.
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    auth_signal: Option<oneshot::Receiver<()>>,
    auth_sent: bool,
    shutdown: Arc<Notify>,
}

impl Session<PollingTransport> {
    /// Create a long-polling session from the API configuration.
    pub fn polling(
        config: &ApiConfig,
        api_key: ApiKey,
    ) -> ClientResult<(Self, SessionHandle)> {
        let transport = PollingTransport::new(&config.socket_url)?;
        Ok(Session::new(transport, config.namespace.clone(), api_key))
    }
}

impl<T: Transport> Session<T> {
    /// Create a session over `transport` for `namespace`.
    ///
    /// A missing leading `/` is added to the namespace.
    pub fn new(
        transport: T,
        namespace: impl Into<String>,
        api_key: ApiKey,
    ) -> (Self, SessionHandle) {
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (auth_tx, auth_rx) = oneshot::channel();
        let shutdown = Arc::new(Notify::new());

        let mut namespace: String = namespace.into();
        if !namespace.starts_with('/') {
            namespace.insert(0, '/');
        }

        let session = Self {
            transport,
            namespace,
            api_key,
            nonces: Arc::new(SystemClock),
            state: state_tx,
            events: events_tx,
            auth_signal: Some(auth_tx),
            shutdown: Arc::clone(&shutdown),
        };

        let handle = SessionHandle {
            state: state_rx,
            events: events_rx,
            auth_signal: Some(auth_rx),
            auth_sent: false,
            shutdown,
        };

        (session, handle)
    }

    /// Replace the nonce source used for the handshake.
    pub fn with_nonce_source(mut self, nonces: Arc<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Run the session until it closes.
    ///
    /// There is no reconnect: once this returns, a new session must be
    /// created and the full handshake runs again.
    pub async fn run(mut self) -> ClientResult<()> {
        let result = self.drive().await;

        let reason = match &result {
            Ok(reason) => reason.clone(),
            Err(e) => DisconnectReason::Error(e.to_string()),
        };
        info!(namespace = %self.namespace, reason = ?reason, "Session closed");

        self.set_state(SessionState::Closed);
        let _ = self.events.send(SessionEvent::Disconnected(reason));

        result.map(|_| ())
    }

    async fn drive(&mut self) -> ClientResult<DisconnectReason> {
        let handshake = self.transport.open().await?;
        info!(
            sid = %handshake.sid,
            namespace = %self.namespace,
            "Connection established"
        );

        let connect = SocketPacket::Connect {
            namespace: self.namespace.clone(),
            data: None,
        };
        self.transport
            .send(vec![EnginePacket::Message(connect.encode()?)])
            .await?;

        let shutdown = Arc::clone(&self.shutdown);
        loop {
            let packets = tokio::select! {
                _ = shutdown.notified() => None,
                packets = self.transport.poll() => Some(packets?),
            };

            let Some(packets) = packets else {
                self.disconnect().await;
                return Ok(DisconnectReason::Client);
            };

            for packet in packets {
                if let Some(reason) = self.handle_packet(packet).await? {
                    return Ok(reason);
                }
            }
        }
    }

    async fn handle_packet(
        &mut self,
        packet: EnginePacket,
    ) -> ClientResult<Option<DisconnectReason>> {
        match packet {
            EnginePacket::Ping(data) => {
                self.transport.send(vec![EnginePacket::Pong(data)]).await?;
                Ok(None)
            }
            EnginePacket::Close => Ok(Some(DisconnectReason::Server)),
            EnginePacket::Message(text) => {
                let packet = SocketPacket::decode(&text)?;
                self.handle_socket_packet(packet).await
            }
            other => {
                debug!(packet = ?other, "Ignoring engine packet");
                Ok(None)
            }
        }
    }

    async fn handle_socket_packet(
        &mut self,
        packet: SocketPacket,
    ) -> ClientResult<Option<DisconnectReason>> {
        if packet.namespace() != self.namespace {
            debug!(namespace = %packet.namespace(), "Ignoring packet for another namespace");
            return Ok(None);
        }

        match packet {
            SocketPacket::Connect { .. } => {
                if self.current_state() != SessionState::Connecting {
                    warn!(namespace = %self.namespace, "Duplicate namespace connect ignored");
                    return Ok(None);
                }
                self.emit(SessionEvent::Connected);
                self.authenticate().await?;
                Ok(None)
            }
            SocketPacket::ConnectError { namespace, data } => {
                let message = match data {
                    Some(Value::Object(map)) => map
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
                    Some(Value::String(message)) => message,
                    Some(other) => other.to_string(),
                    None => "connection refused".to_string(),
                };
                Err(ClientError::Session {
                    kind: SessionErrorKind::ConnectRejected { namespace, message },
                })
            }
            SocketPacket::Disconnect { .. } => Ok(Some(DisconnectReason::Server)),
            SocketPacket::Event {
                name,
                mut args,
                ack_id,
                ..
            } => {
                if self.current_state() != SessionState::AuthSent {
                    warn!(event = %name, "Dropping event received before authentication");
                    return Ok(None);
                }
                if let Some(ack_id) = ack_id {
                    let ack = SocketPacket::Ack {
                        namespace: self.namespace.clone(),
                        ack_id,
                        args: Vec::new(),
                    };
                    self.transport
                        .send(vec![EnginePacket::Message(ack.encode()?)])
                        .await?;
                    debug!(event = %name, ack_id, "Acknowledged event");
                }

                let event = match name.as_str() {
                    INFO_EVENT => SessionEvent::Info(first_arg(&mut args)),
                    TX_EVENT => SessionEvent::Transaction(first_arg(&mut args)),
                    _ => SessionEvent::Other { name, args },
                };
                self.emit(event);
                Ok(None)
            }
            SocketPacket::Ack { ack_id, .. } => {
                debug!(ack_id, "Ignoring ack");
                Ok(None)
            }
        }
    }

    /// Sign a fresh nonce and emit the `auth` event.
    async fn authenticate(&mut self) -> ClientResult<()> {
        let nonce = self.nonces.next_nonce()?;
        let payload = AuthPayload::new(&self.api_key, nonce)?;

        info!(
            api_key = %self.api_key.token(),
            nonce,
            "Authenticating with api key"
        );

        let packet = payload.to_packet(&self.namespace)?;
        self.transport
            .send(vec![EnginePacket::Message(packet.encode()?)])
            .await?;

        self.set_state(SessionState::AuthSent);
        if let Some(signal) = self.auth_signal.take() {
            let _ = signal.send(());
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        let packet = SocketPacket::Disconnect {
            namespace: self.namespace.clone(),
        };
        match packet.encode() {
            Ok(text) => {
                if let Err(e) = self
                    .transport
                    .send(vec![EnginePacket::Message(text)])
                    .await
                {
                    warn!(error = %e, "Failed to send namespace disconnect");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode namespace disconnect"),
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close transport");
        }
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session event receiver dropped");
        }
    }
}

fn first_arg(args: &mut Vec<Value>) -> Value {
    if args.is_empty() {
        Value::Null
    } else {
        args.swap_remove(0)
    }
}

impl SessionHandle {
    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the `auth` event has been emitted.
    ///
    /// Fails if the session closes first.
    pub async fn wait_for_auth(&mut self) -> ClientResult<()> {
        if let Some(signal) = self.auth_signal.take() {
            self.auth_sent = signal.await.is_ok();
        }

        if self.auth_sent {
            Ok(())
        } else {
            Err(ClientError::Session {
                kind: SessionErrorKind::ClosedBeforeAuth,
            })
        }
    }

    /// Next session event, or `None` once the session is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Ask the session to disconnect.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}
