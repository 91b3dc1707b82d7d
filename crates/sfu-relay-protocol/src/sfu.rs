//! Control protocol spoken with the SFU.
//!
//! Every frame is a JSON object tagged by `"type"` with camelCase fields.
//! SDP and ICE payloads are carried as opaque strings.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, RoomId};

/// Messages sent from the relay to the SFU
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SfuRequest {
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: RoomId,
        peer_id: ConnectionId,
        offer: String,
    },

    Offer { sdp: String },

    Answer { sdp: String },

    #[serde(rename_all = "camelCase")]
    Trickle { candidate: String, m_line_index: u16 },
}

impl SfuRequest {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SfuRequest::Join { .. } => "join",
            SfuRequest::Offer { .. } => "offer",
            SfuRequest::Answer { .. } => "answer",
            SfuRequest::Trickle { .. } => "trickle",
        }
    }
}

/// Messages pushed by the SFU to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SfuMessage {
    /// Renegotiation offer from the SFU
    Offer { sdp: String },

    /// Answer to our join or offer
    Answer { sdp: String },

    /// ICE candidate gathered by the SFU
    #[serde(rename_all = "camelCase")]
    Trickle { candidate: String, m_line_index: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_wire_shape() {
        let value = serde_json::to_value(SfuRequest::Join {
            room_id: "room1".into(),
            peer_id: "A".into(),
            offer: "v=0".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "type": "join", "roomId": "room1", "peerId": "A", "offer": "v=0" })
        );
    }

    #[test]
    fn trickle_wire_shape() {
        let value = serde_json::to_value(SfuRequest::Trickle {
            candidate: "candidate:1 1 udp 2122260223 10.0.0.1 54321 typ host".into(),
            m_line_index: 0,
        })
        .unwrap();
        assert_eq!(value["type"], "trickle");
        assert_eq!(value["mLineIndex"], 0);
    }

    #[test]
    fn parses_sfu_answer() {
        let msg: SfuMessage =
            serde_json::from_str(r#"{"type":"answer","sdp":"v=0\r\n"}"#).unwrap();
        assert_eq!(
            msg,
            SfuMessage::Answer {
                sdp: "v=0\r\n".into()
            }
        );
    }
}
