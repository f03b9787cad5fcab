//! Chat gateway wire protocol — what the client and server send to each other.
//!
//! JSON text frames carrying a tagged `op`/`d` envelope. The client speaks
//! [`ChatClientEvent`], the server answers with [`ChatServerEvent`] — either
//! directly (history, acks, heartbeat) or fanned out to the room.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studyhall_common::models::message::{ChatMessage, OutgoingMessage};

/// Reference to the joining user. Display name only — chat identity is not
/// authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
}

/// Client → Server chat events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ChatClientEvent {
    /// Join a room (implicitly leaving the current one, if any).
    JoinRoom { room_id: String, user: UserRef },

    /// Send a message to a room the connection has joined.
    SendMessage {
        room_id: String,
        message: OutgoingMessage,
    },

    /// Keepalive ping.
    Heartbeat { timestamp: i64 },
}

/// Server → Client chat events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ChatServerEvent {
    /// Direct reply to a join: snapshot of recent history, oldest → newest.
    RoomHistory {
        room_id: String,
        messages: Vec<ChatMessage>,
    },

    /// A persisted message from another room member.
    NewMessage { message: ChatMessage },

    /// Room-level notice (user joined/left) or a direct error line.
    SystemMessage {
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Direct acknowledgement of a `SendMessage`. The ack — never the
    /// broadcast — is what resolves the sender's optimistic entry.
    SendAck {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<ChatMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_message_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Keepalive pong.
    HeartbeatAck { timestamp: i64 },
}

impl ChatServerEvent {
    /// System notice helper with a server-assigned timestamp.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::SystemMessage {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Negative send ack.
    pub fn send_failure(client_message_id: Option<String>, error: impl Into<String>) -> Self {
        Self::SendAck {
            ok: false,
            message: None,
            client_message_id,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_wire_shape() {
        let ev: ChatClientEvent = serde_json::from_str(
            r#"{"op":"JoinRoom","d":{"room_id":"Commons","user":{"name":"Ava"}}}"#,
        )
        .unwrap();
        match ev {
            ChatClientEvent::JoinRoom { room_id, user } => {
                assert_eq!(room_id, "Commons");
                assert_eq!(user.name, "Ava");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_ack_omits_empty_fields() {
        let ack = ChatServerEvent::SendAck {
            ok: false,
            message: None,
            client_message_id: Some("c1".into()),
            error: Some("not a member".into()),
        };
        let wire = serde_json::to_value(&ack).unwrap();
        assert_eq!(wire["op"], "SendAck");
        assert_eq!(wire["d"]["ok"], false);
        assert_eq!(wire["d"]["client_message_id"], "c1");
        assert!(wire["d"].get("message").is_none());
    }
}
