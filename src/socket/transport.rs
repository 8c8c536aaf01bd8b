//! Engine.IO transport abstraction.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::protocol::{EnginePacket, OpenHandshake};

/// Carries Engine.IO packets between the session and the server.
///
/// `poll` may block until the server has something to deliver and may
/// return an empty batch.
#[async_trait]
pub trait Transport: Send {
    /// Open the Engine.IO connection.
    async fn open(&mut self) -> ClientResult<OpenHandshake>;

    /// Send a batch of packets.
    async fn send(&mut self, packets: Vec<EnginePacket>) -> ClientResult<()>;

    /// Receive the next batch of packets.
    async fn poll(&mut self) -> ClientResult<Vec<EnginePacket>>;

    /// Close the connection.
    async fn close(&mut self) -> ClientResult<()>;
}
