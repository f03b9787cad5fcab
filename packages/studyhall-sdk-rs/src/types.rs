//! Wire types for the Studyhall protocols.
//!
//! The SDK is self-contained: these mirror the server's `op`/`d` tagged
//! envelopes field for field, without pulling in the server crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Chat ─────────────────────────────────────────────────────────────────────

/// A persisted chat message as delivered by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: String,
    pub user_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message as submitted to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

/// Reference to the joining user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
}

/// Client → Server chat events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ChatClientEvent {
    JoinRoom { room_id: String, user: UserRef },
    SendMessage {
        room_id: String,
        message: OutgoingMessage,
    },
    Heartbeat { timestamp: i64 },
}

/// Server → Client chat events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ChatServerEvent {
    RoomHistory {
        room_id: String,
        messages: Vec<ChatMessage>,
    },
    NewMessage { message: ChatMessage },
    SystemMessage {
        text: String,
        timestamp: DateTime<Utc>,
    },
    SendAck {
        ok: bool,
        #[serde(default)]
        message: Option<ChatMessage>,
        #[serde(default)]
        client_message_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    HeartbeatAck { timestamp: i64 },
}

// ── Video signaling ──────────────────────────────────────────────────────────

/// A participant advertised by the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: Uuid,
    pub user_name: String,
}

/// Client → Server signaling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum VideoClientEvent {
    Join { room_id: String, user_name: String },
    Signal {
        room_id: String,
        target_id: Uuid,
        data: serde_json::Value,
    },
    Leave { room_id: String },
}

/// Server → Client signaling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum VideoServerEvent {
    Peers {
        room_id: String,
        peers: Vec<PeerInfo>,
    },
    PeerConnected {
        peer_id: Uuid,
        room_id: String,
        user_name: String,
    },
    Signal {
        from: Uuid,
        room_id: String,
        data: serde_json::Value,
    },
    PeerDisconnected { peer_id: Uuid, room_id: String },
    Error { code: u32, message: String },
}

/// The negotiation payload carried opaquely inside `Signal` envelopes.
///
/// Only clients interpret this — the relay moves it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SignalPayload {
    /// Session offer from the connection initiator.
    Offer { sdp: String },
    /// Session answer from the responder.
    Answer { sdp: String },
    /// A transport candidate; opaque to everything but the media engine.
    Candidate { candidate: serde_json::Value },
}

// ── Rooms ────────────────────────────────────────────────────────────────────

/// A discussable room from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Catalog response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCatalog {
    pub rooms: Vec<RoomInfo>,
}
