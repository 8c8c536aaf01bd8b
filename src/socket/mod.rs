//! Socket session module.
//!
//! Socket.IO over Engine.IO long-polling, with the API key handshake run on
//! namespace connect.

mod handshake;
mod polling;
mod session;
mod transport;

pub use handshake::{AuthPayload, AUTH_EVENT};
pub use polling::{polling_endpoint, PollingTransport};
pub use session::{
    DisconnectReason, Session, SessionEvent, SessionHandle, SessionState, INFO_EVENT, TX_EVENT,
};
pub use transport::Transport;
