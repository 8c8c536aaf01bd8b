//! Wire protocol module.
//!
//! Canonical body encoding and signed REST requests, plus the Engine.IO and
//! Socket.IO packet codecs used by the socket session.

mod canonical;
mod engine;
mod request;
mod socketio;

pub use canonical::{CanonicalEncoder, JsonEncoder, Params};
pub use engine::{
    decode_payload, encode_payload, EnginePacket, OpenHandshake, ENGINE_IO_VERSION,
    RECORD_SEPARATOR,
};
pub use request::{join_url, PreparedRequest, SIGNATURE_HEADER};
pub use socketio::{SocketPacket, ROOT_NAMESPACE};
