//! Room-scoped broadcast events — shared between the relay crates.
//!
//! Each relay (chat gateway, video signaling) owns a `broadcast` channel of
//! these envelopes. Every connection's sender task filters the stream against
//! its own connection ID and current room, so fan-out, exclusion ("everyone
//! but the sender") and targeted delivery (signal relay) all ride the same
//! channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event addressed to some subset of a room's connections.
///
/// The payload is the already-serialized server event; the relay decides the
/// wire shape, the envelope only decides who receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Room this event belongs to (normalized key).
    pub room_id: String,
    /// Deliver only to this connection, regardless of the room filter.
    pub target: Option<Uuid>,
    /// Deliver to the room's members except this connection.
    pub exclude: Option<Uuid>,
    /// Serialized server event payload.
    pub payload: serde_json::Value,
}

impl RoomEvent {
    /// Event for every member of `room_id`.
    pub fn to_room(room_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            room_id: room_id.into(),
            target: None,
            exclude: None,
            payload,
        }
    }

    /// Event for every member of `room_id` except `conn_id`.
    pub fn to_room_except(
        room_id: impl Into<String>,
        conn_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            target: None,
            exclude: Some(conn_id),
            payload,
        }
    }

    /// Event for a single connection in `room_id`.
    pub fn to_target(
        room_id: impl Into<String>,
        conn_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            target: Some(conn_id),
            exclude: None,
            payload,
        }
    }

    /// Whether a connection currently in `current_room` should receive this
    /// event. Pure — this is the single place fan-out addressing is decided.
    pub fn should_deliver(&self, conn_id: Uuid, current_room: Option<&str>) -> bool {
        if let Some(target) = self.target {
            return target == conn_id && current_room == Some(self.room_id.as_str());
        }
        if self.exclude == Some(conn_id) {
            return false;
        }
        current_room == Some(self.room_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_events_reach_members_only() {
        let ev = RoomEvent::to_room("commons", json!({"op": "NewMessage"}));
        let a = Uuid::new_v4();
        assert!(ev.should_deliver(a, Some("commons")));
        assert!(!ev.should_deliver(a, Some("placements")));
        assert!(!ev.should_deliver(a, None));
    }

    #[test]
    fn test_excluded_connection_is_skipped() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ev = RoomEvent::to_room_except("commons", a, json!({}));
        assert!(!ev.should_deliver(a, Some("commons")));
        assert!(ev.should_deliver(b, Some("commons")));
    }

    #[test]
    fn test_targeted_event_reaches_exactly_one() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ev = RoomEvent::to_target("lab-1", a, json!({}));
        assert!(ev.should_deliver(a, Some("lab-1")));
        assert!(!ev.should_deliver(b, Some("lab-1")));
        // Target that already moved rooms no longer receives it
        assert!(!ev.should_deliver(a, Some("lab-2")));
    }
}
