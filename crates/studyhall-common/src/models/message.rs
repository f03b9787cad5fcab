//! Chat message model — the persisted content unit.
//!
//! Messages are immutable once persisted: there is no edit path, and the only
//! delete path is the administrative bulk purge. Ordering within a room is by
//! `created_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,

    /// Room key this message belongs to (normalized: trimmed + lowercase)
    pub room_id: String,

    /// Display name of the sender — not an authenticated identity
    pub user_name: String,

    /// Message body (trimmed)
    pub text: String,

    /// Server-assigned creation timestamp
    pub created_at: DateTime<Utc>,

    /// Server-assigned update timestamp (equals `created_at`; kept for the
    /// persisted record shape)
    pub updated_at: DateTime<Utc>,
}

/// A message as submitted by a client, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub user_name: String,
    /// Client-generated correlation ID, echoed back in the send ack so the
    /// sender can resolve its optimistic pending entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}
