//! Video room participant registry.
//!
//! In-memory only — video rooms are never persisted. A room materializes when
//! the first participant joins and is forgotten when the last one leaves.
//!
//! Two indexes, same shape as the chat registry but independent of it: a
//! connection may be in one chat room and one video room at the same time.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::protocol::PeerInfo;

/// One participant in a video room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub conn_id: Uuid,
    pub room_id: String,
    pub user_name: String,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            peer_id: self.conn_id,
            user_name: self.user_name.clone(),
        }
    }
}

/// Tracks which connection participates in which video room.
#[derive(Clone)]
pub struct SignalRegistry {
    by_conn: Arc<RwLock<HashMap<Uuid, Participant>>>,
    by_room: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self {
            by_conn: Arc::new(RwLock::new(HashMap::new())),
            by_room: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join a video room, implicitly leaving the previous one. Returns the
    /// new participant record, the peers already present (excluding the
    /// joiner), and the previous participation if there was one.
    pub async fn join(
        &self,
        conn_id: Uuid,
        room_id: &str,
        user_name: &str,
    ) -> (Participant, Vec<PeerInfo>, Option<Participant>) {
        let previous = self.leave(conn_id).await;

        let existing = self.peers(room_id).await;

        let participant = Participant {
            conn_id,
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
            joined_at: Utc::now(),
        };

        self.by_conn
            .write()
            .await
            .insert(conn_id, participant.clone());
        self.by_room
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .push(conn_id);

        tracing::info!(conn = %conn_id, room = %room_id, user = %user_name, "Joined video room");

        (participant, existing, previous)
    }

    /// Remove the connection from its video room; the room is forgotten when
    /// it empties. Returns the participation that was removed, if any.
    pub async fn leave(&self, conn_id: Uuid) -> Option<Participant> {
        let participant = self.by_conn.write().await.remove(&conn_id);

        if let Some(ref p) = participant {
            let mut rooms = self.by_room.write().await;
            if let Some(members) = rooms.get_mut(&p.room_id) {
                members.retain(|c| *c != conn_id);
                if members.is_empty() {
                    rooms.remove(&p.room_id);
                }
            }

            tracing::info!(conn = %conn_id, room = %p.room_id, "Left video room");
        }

        participant
    }

    /// Whether `conn_id` currently participates in `room_id`.
    pub async fn is_member(&self, conn_id: Uuid, room_id: &str) -> bool {
        self.by_conn
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|p| p.room_id == room_id)
    }

    /// The advertised peer list of a room.
    pub async fn peers(&self, room_id: &str) -> Vec<PeerInfo> {
        let rooms = self.by_room.read().await;
        let conns = self.by_conn.read().await;

        rooms
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|c| conns.get(c).map(Participant::info))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registry stats for the health endpoint.
    pub async fn stats(&self) -> SignalStats {
        SignalStats {
            active_rooms: self.by_room.read().await.len(),
            participants: self.by_conn.read().await.len(),
        }
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts exposed by the health endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct SignalStats {
    pub active_rooms: usize,
    pub participants: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_reports_existing_peers_excluding_self() {
        let registry = SignalRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (_, peers, _) = registry.join(a, "lab-1", "Ava").await;
        assert!(peers.is_empty());

        let (_, peers, _) = registry.join(b, "lab-1", "Ben").await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, a);
        assert_eq!(peers[0].user_name, "Ava");
    }

    #[tokio::test]
    async fn test_switching_video_rooms_leaves_no_stale_entry() {
        let registry = SignalRegistry::new();
        let a = Uuid::new_v4();

        registry.join(a, "lab-1", "Ava").await;
        let (_, _, previous) = registry.join(a, "lab-2", "Ava").await;

        assert_eq!(previous.unwrap().room_id, "lab-1");
        assert!(registry.peers("lab-1").await.is_empty());
        assert!(registry.is_member(a, "lab-2").await);
    }

    #[tokio::test]
    async fn test_last_leave_forgets_the_room() {
        let registry = SignalRegistry::new();
        let a = Uuid::new_v4();

        registry.join(a, "lab-1", "Ava").await;
        registry.leave(a).await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.participants, 0);
    }
}
