//! Chat room membership registry.
//!
//! The only shared mutable state on the chat path. Explicitly owned by
//! [`crate::ChatState`] and injected where needed — never a process-global.
//!
//! Two indexes for fast lookups:
//! - `by_conn`: conn_id → Membership (quick "where is this connection?")
//! - `by_room`: room_id → [conn_id] (quick "who's in this room?")
//!
//! Invariant: a connection belongs to at most one chat room. Joining while
//! already in a room performs an implicit leave first, so the indexes never
//! hold stale entries.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One connection's room membership.
#[derive(Debug, Clone)]
pub struct Membership {
    pub conn_id: Uuid,
    pub room_id: String,
    pub user_name: String,
    pub joined_at: DateTime<Utc>,
}

/// Tracks which connection is in which chat room.
#[derive(Clone)]
pub struct RoomRegistry {
    by_conn: Arc<RwLock<HashMap<Uuid, Membership>>>,
    by_room: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            by_conn: Arc::new(RwLock::new(HashMap::new())),
            by_room: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join `room_id`. If the connection is already in a room, it leaves that
    /// room first. Returns (new membership, Option<previous membership>).
    pub async fn join(
        &self,
        conn_id: Uuid,
        room_id: &str,
        user_name: &str,
    ) -> (Membership, Option<Membership>) {
        let previous = self.leave(conn_id).await;

        let membership = Membership {
            conn_id,
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
            joined_at: Utc::now(),
        };

        self.by_conn
            .write()
            .await
            .insert(conn_id, membership.clone());
        self.by_room
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .push(conn_id);

        tracing::info!(conn = %conn_id, room = %room_id, user = %user_name, "Joined chat room");

        (membership, previous)
    }

    /// Remove the connection from whatever room it is in. Returns the
    /// membership it held, if any. Empty rooms are forgotten.
    pub async fn leave(&self, conn_id: Uuid) -> Option<Membership> {
        let membership = self.by_conn.write().await.remove(&conn_id);

        if let Some(ref m) = membership {
            let mut rooms = self.by_room.write().await;
            if let Some(members) = rooms.get_mut(&m.room_id) {
                members.retain(|c| *c != conn_id);
                if members.is_empty() {
                    rooms.remove(&m.room_id);
                }
            }

            tracing::info!(conn = %conn_id, room = %m.room_id, "Left chat room");
        }

        membership
    }

    /// Whether the connection is currently a member of `room_id`.
    pub async fn is_member(&self, conn_id: Uuid, room_id: &str) -> bool {
        self.by_conn
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|m| m.room_id == room_id)
    }

    /// Current membership of a connection.
    pub async fn membership(&self, conn_id: Uuid) -> Option<Membership> {
        self.by_conn.read().await.get(&conn_id).cloned()
    }

    /// All members of a room.
    pub async fn members(&self, room_id: &str) -> Vec<Membership> {
        let rooms = self.by_room.read().await;
        let conns = self.by_conn.read().await;

        rooms
            .get(room_id)
            .map(|ids| ids.iter().filter_map(|c| conns.get(c).cloned()).collect())
            .unwrap_or_default()
    }

    /// Registry stats for the health endpoint.
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_rooms: self.by_room.read().await.len(),
            connected_clients: self.by_conn.read().await.len(),
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts exposed by the health endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub connected_clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_tracks_joins_and_leaves() {
        let registry = RoomRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.join(a, "commons", "Ava").await;
        registry.join(b, "commons", "Ben").await;
        assert_eq!(registry.members("commons").await.len(), 2);

        registry.leave(a).await;
        let remaining = registry.members("commons").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_name, "Ben");
    }

    #[tokio::test]
    async fn test_rejoin_implicitly_leaves_previous_room() {
        let registry = RoomRegistry::new();
        let a = Uuid::new_v4();

        registry.join(a, "commons", "Ava").await;
        let (m, previous) = registry.join(a, "placements", "Ava").await;

        assert_eq!(m.room_id, "placements");
        assert_eq!(previous.unwrap().room_id, "commons");
        // No stale entry survives in the old room
        assert!(registry.members("commons").await.is_empty());
        assert!(registry.is_member(a, "placements").await);
        assert!(!registry.is_member(a, "commons").await);
    }

    #[tokio::test]
    async fn test_empty_rooms_are_forgotten() {
        let registry = RoomRegistry::new();
        let a = Uuid::new_v4();

        registry.join(a, "commons", "Ava").await;
        registry.leave(a).await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.connected_clients, 0);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_noop() {
        let registry = RoomRegistry::new();
        assert!(registry.leave(Uuid::new_v4()).await.is_none());
    }
}
