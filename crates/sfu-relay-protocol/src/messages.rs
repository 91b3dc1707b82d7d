use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, RoomData, RoomId, StreamId};

/// Messages sent from a browser client to the relay via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room, creating it if needed, and hand the SFU our offer
    Join { room_id: RoomId, offer: String },

    /// SDP offer for the SFU (renegotiation)
    Offer { sdp: String },

    /// SDP answer to an offer the SFU sent us
    Answer { sdp: String },

    /// ICE candidate for the SFU
    Trickle { candidate: String },

    /// Bind this connection to the SFU stream carrying its media
    SetStreamPeerId { stream_id: StreamId },

    /// Explicitly create a room; a fresh id is generated when none is given
    CreateRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        name: Option<String>,
    },

    /// Leave a room without disconnecting
    LeaveRoom { room_id: RoomId },

    /// Peer-to-peer offer to a single connection
    SendOffer { target: ConnectionId, sdp: String },

    /// Peer-to-peer answer to a single connection
    SendAnswer { target: ConnectionId, sdp: String },

    /// Peer-to-peer ICE candidate to a single connection
    SendIceCandidate {
        target: ConnectionId,
        candidate: String,
    },

    /// Peer-to-peer offer to everyone else in a room
    SendOfferToRoom { room_id: RoomId, sdp: String },

    /// Peer-to-peer ICE candidate to everyone else in a room
    SendIceCandidateToRoom { room_id: RoomId, candidate: String },

    /// Ping to keep connection alive
    Ping,
}

impl ClientMessage {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::Trickle { .. } => "trickle",
            ClientMessage::SetStreamPeerId { .. } => "set_stream_peer_id",
            ClientMessage::CreateRoom { .. } => "create_room",
            ClientMessage::LeaveRoom { .. } => "leave_room",
            ClientMessage::SendOffer { .. } => "send_offer",
            ClientMessage::SendAnswer { .. } => "send_answer",
            ClientMessage::SendIceCandidate { .. } => "send_ice_candidate",
            ClientMessage::SendOfferToRoom { .. } => "send_offer_to_room",
            ClientMessage::SendIceCandidateToRoom { .. } => "send_ice_candidate_to_room",
            ClientMessage::Ping => "ping",
        }
    }
}

/// Messages sent from the relay to a browser client via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Upstream session established; this is the caller's connection id
    ReceiveConnectionId { connection_id: ConnectionId },

    /// Another connection joined a room we are in
    PeerJoined { connection_id: ConnectionId },

    /// Another connection in our room went away
    PeerDisconnected { connection_id: ConnectionId },

    /// Another connection left our room but is still connected
    PeerLeft { connection_id: ConnectionId },

    /// Room created on request
    RoomCreated { room: RoomData },

    /// SDP offer from a peer or from the SFU
    ReceiveOffer { from: ConnectionId, sdp: String },

    /// SDP answer from a peer or from the SFU
    ReceiveAnswer { from: ConnectionId, sdp: String },

    /// ICE candidate from a peer or from the SFU
    ReceiveIceCandidate {
        from: ConnectionId,
        candidate: String,
    },

    /// Error message
    Error { message: String },

    /// Pong response to ping
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "set_stream_peer_id",
            "stream_id": "streamX"
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetStreamPeerId {
                stream_id: "streamX".into()
            }
        );
    }

    #[test]
    fn create_room_fields_are_optional() {
        let msg: ClientMessage = serde_json::from_value(json!({ "type": "create_room" })).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom {
                room_id: None,
                name: None
            }
        );
    }

    #[test]
    fn server_message_shape() {
        let value = serde_json::to_value(ServerMessage::ReceiveOffer {
            from: "A".into(),
            sdp: "v=0".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "type": "receive_offer", "from": "A", "sdp": "v=0" })
        );

        let value = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(value, json!({ "type": "pong" }));
    }
}
