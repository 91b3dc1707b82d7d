use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a client connection.
pub type ConnectionId = String;

/// Opaque identifier of a room.
pub type RoomId = String;

/// Stream identifier assigned by the SFU.
pub type StreamId = String;

/// Sender id used when a message originates from the SFU rather than a peer
pub const SFU_PEER_ID: &str = "sfu";

/// Room data shared between client and server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomData {
    pub id: RoomId,
    pub name: Option<String>,
    pub members: Vec<ConnectionId>,
    pub created_at: DateTime<Utc>,
}
