use sfu_relay_protocol::{ConnectionId, StreamId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("SFU unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("SFU session closed")]
    SessionClosed,

    #[error("Peer {peer} or stream {stream} is already bound to another counterpart")]
    AlreadyBound { peer: ConnectionId, stream: StreamId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
