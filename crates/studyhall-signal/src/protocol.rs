//! Video signaling wire protocol.
//!
//! The relay never interprets negotiation payloads: offers, answers, and ICE
//! candidates travel as opaque JSON between exactly two named peers. The
//! relay's whole job is peer discovery (who is in the room) and addressing.
//!
//! Media never flows here — once negotiation succeeds, audio/video moves
//! peer-to-peer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client → Server signaling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum VideoClientEvent {
    /// Join a video room (implicitly leaving the current one, if any).
    Join { room_id: String, user_name: String },

    /// Relay an opaque negotiation payload to a single named peer.
    Signal {
        room_id: String,
        target_id: Uuid,
        data: serde_json::Value,
    },

    /// Leave the video room.
    Leave { room_id: String },
}

/// Server → Client signaling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum VideoServerEvent {
    /// Direct reply to a join: the room's current participants, excluding
    /// the joiner. The joiner offers to every peer in this list.
    Peers {
        room_id: String,
        peers: Vec<PeerInfo>,
    },

    /// A new peer joined after you. Do not offer — wait for theirs.
    PeerConnected {
        peer_id: Uuid,
        room_id: String,
        user_name: String,
    },

    /// A relayed negotiation payload, tagged with the sender's peer id.
    Signal {
        from: Uuid,
        room_id: String,
        data: serde_json::Value,
    },

    /// A peer left or lost its transport.
    PeerDisconnected { peer_id: Uuid, room_id: String },

    /// Protocol-level error (malformed event, invalid join).
    Error { code: u32, message: String },
}

/// A participant as advertised to other peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: Uuid,
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_payload_stays_opaque() {
        let target = Uuid::new_v4();
        let ev: VideoClientEvent = serde_json::from_value(json!({
            "op": "Signal",
            "d": {
                "room_id": "lab-1",
                "target_id": target,
                "data": {"kind": "offer", "sdp": "v=0..."},
            }
        }))
        .unwrap();
        match ev {
            VideoClientEvent::Signal { target_id, data, .. } => {
                assert_eq!(target_id, target);
                assert_eq!(data["kind"], "offer");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
