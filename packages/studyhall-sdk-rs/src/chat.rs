//! Optimistic chat timeline.
//!
//! Sending a message paints it into the timeline immediately; the entry then
//! resolves through exactly one of three independent event sources:
//!
//! - the server **ack** (matched by correlation id) → `Confirmed`
//! - the 7 s **timeout** → `Unconfirmed` (still displayed, flagged unsaved)
//! - an explicit **failure ack** → entry removed, synthetic system line added
//!
//! A **broadcast** can also resolve a pending entry, but only through the
//! fallback heuristic for peers that sent without a correlation id: same
//! sender, same text, timestamps within 10 seconds. The heuristic is
//! ambiguous under rapid-fire identical messages from the same user; it
//! matches the oldest pending candidate, which reproduces the historical
//! behavior. Every apply is idempotent on message id.
//!
//! [`Timeline`] is a pure state machine — no transport, no clock of its own —
//! so all of the above is unit-testable. [`ChatSession`] wires it to a
//! [`ChatGateway`] and to tokio timers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::ChatGateway;
use crate::types::{ChatMessage, ChatServerEvent, OutgoingMessage};

/// How long a pending entry waits for its ack before it is flagged unsaved.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(7);

/// Window for the fallback broadcast-matching heuristic.
pub const MATCH_WINDOW_SECS: i64 = 10;

/// Delivery state of a timeline entry — a tagged union so reconciliation is
/// exhaustive, not a pile of booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Painted locally, waiting for the server.
    Pending,
    /// The server persisted it.
    Confirmed,
    /// The ack never came; kept visible, flagged unsaved.
    Unconfirmed,
}

/// One line of the chat timeline.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    /// Server message id once confirmed; the local correlation id before.
    pub id: String,
    /// Local correlation id for entries this client sent.
    pub client_id: Option<String>,
    pub user_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub delivery: Delivery,
    /// Synthetic notice (join/leave/error lines), not a user message.
    pub system: bool,
}

/// The pure timeline state machine.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    seen_ids: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Paint an optimistic entry and return its correlation id.
    pub fn begin_send(&mut self, user_name: &str, text: &str, now: DateTime<Utc>) -> String {
        let client_id = Uuid::now_v7().to_string();
        self.entries.push(TimelineEntry {
            id: client_id.clone(),
            client_id: Some(client_id.clone()),
            user_name: user_name.to_string(),
            text: text.to_string(),
            timestamp: now,
            delivery: Delivery::Pending,
            system: false,
        });
        client_id
    }

    /// Replace the history with a join snapshot, keeping any local entries
    /// that are still pending (they postdate the snapshot by construction).
    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        let pending: Vec<TimelineEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.delivery == Delivery::Pending)
            .collect();
        self.seen_ids.clear();

        for m in messages {
            self.push_server_message(m, Delivery::Confirmed);
        }
        self.entries.extend(pending);
    }

    /// Apply a direct send acknowledgement.
    pub fn apply_ack(
        &mut self,
        ok: bool,
        message: Option<ChatMessage>,
        client_message_id: Option<String>,
    ) {
        if !ok {
            // Explicit failure: drop the optimistic entry, surface an error line.
            if let Some(cid) = &client_message_id {
                self.entries
                    .retain(|e| e.client_id.as_deref() != Some(cid.as_str()));
            }
            self.push_system_line("Message failed to send. Please retry.");
            return;
        }

        let Some(message) = message else {
            return;
        };
        if self.seen_ids.contains(&message.id.to_string()) {
            return;
        }

        // Resolve by correlation id. A late ack may land after the timeout
        // already flagged the entry Unconfirmed — the persisted copy wins.
        if let Some(cid) = &client_message_id {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.client_id.as_deref() == Some(cid.as_str()))
            {
                let client_id = entry.client_id.clone();
                *entry = Self::entry_from(message, Delivery::Confirmed, client_id);
                let id = entry.id.clone();
                self.seen_ids.insert(id);
                return;
            }
        }

        // Unknown correlation id: treat the persisted copy as a new line.
        self.push_server_message(message, Delivery::Confirmed);
    }

    /// Flag a pending entry unsaved once its ack window elapses. A no-op for
    /// entries that already resolved — resolution always beats the timer.
    pub fn apply_timeout(&mut self, client_id: &str) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.client_id.as_deref() == Some(client_id) && e.delivery == Delivery::Pending)
        {
            entry.delivery = Delivery::Unconfirmed;
        }
    }

    /// Apply a fanned-out message from the room.
    ///
    /// Duplicates (by id) are dropped silently. A broadcast that plausibly
    /// confirms one of our own pending sends — same sender, same text, within
    /// the 10 s window — splices in as the replacement instead of appending.
    pub fn apply_broadcast(&mut self, message: ChatMessage) {
        if self.seen_ids.contains(&message.id.to_string()) {
            return;
        }

        let matched = self.entries.iter_mut().find(|e| {
            e.delivery == Delivery::Pending
                && e.user_name == message.user_name
                && e.text == message.text
                && (message.created_at - e.timestamp).abs()
                    <= ChronoDuration::seconds(MATCH_WINDOW_SECS)
        });

        if let Some(entry) = matched {
            let client_id = entry.client_id.clone();
            *entry = Self::entry_from(message, Delivery::Confirmed, client_id);
            let id = entry.id.clone();
            self.seen_ids.insert(id);
        } else {
            self.push_server_message(message, Delivery::Confirmed);
        }
    }

    /// Append a synthetic system line (join/leave notices, error lines).
    pub fn push_system_line(&mut self, text: &str) {
        self.entries.push(TimelineEntry {
            id: Uuid::now_v7().to_string(),
            client_id: None,
            user_name: String::new(),
            text: text.to_string(),
            timestamp: Utc::now(),
            delivery: Delivery::Confirmed,
            system: true,
        });
    }

    fn push_server_message(&mut self, message: ChatMessage, delivery: Delivery) {
        let id = message.id.to_string();
        if !self.seen_ids.insert(id) {
            return;
        }
        self.entries
            .push(Self::entry_from(message, delivery, None));
    }

    fn entry_from(
        message: ChatMessage,
        delivery: Delivery,
        client_id: Option<String>,
    ) -> TimelineEntry {
        TimelineEntry {
            id: message.id.to_string(),
            client_id,
            user_name: message.user_name,
            text: message.text,
            timestamp: message.created_at,
            delivery,
            system: false,
        }
    }
}

/// A live chat session: the timeline plus its gateway and timers.
pub struct ChatSession {
    gateway: ChatGateway,
    timeline: Arc<Mutex<Timeline>>,
    user_name: String,
    room_id: Arc<Mutex<Option<String>>>,
}

impl ChatSession {
    /// Create a session and start pumping gateway events into the timeline.
    pub fn new(gateway: ChatGateway, user_name: impl Into<String>) -> Self {
        let session = Self {
            gateway,
            timeline: Arc::new(Mutex::new(Timeline::new())),
            user_name: user_name.into(),
            room_id: Arc::new(Mutex::new(None)),
        };
        session.spawn_event_pump();
        session
    }

    /// Join a room; the server replies with the history snapshot.
    pub async fn join(&self, room_id: &str) -> Result<()> {
        *self.room_id.lock().await = Some(room_id.to_string());
        self.gateway.join_room(room_id, &self.user_name).await
    }

    /// Optimistically send a message. Returns the correlation id.
    pub async fn send(&self, text: &str) -> Result<String> {
        let room_id = self
            .room_id
            .lock()
            .await
            .clone()
            .ok_or(crate::error::SdkError::NotConnected)?;

        let client_id = self
            .timeline
            .lock()
            .await
            .begin_send(&self.user_name, text, Utc::now());

        self.gateway
            .send_message(
                &room_id,
                OutgoingMessage {
                    text: text.to_string(),
                    user_name: self.user_name.clone(),
                    client_message_id: Some(client_id.clone()),
                },
            )
            .await?;

        schedule_ack_timeout(self.timeline.clone(), client_id.clone());
        Ok(client_id)
    }

    /// Snapshot of the current timeline.
    pub async fn timeline(&self) -> Vec<TimelineEntry> {
        self.timeline.lock().await.entries().to_vec()
    }

    fn spawn_event_pump(&self) {
        let mut events = self.gateway.subscribe();
        let timeline = self.timeline.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                let mut tl = timeline.lock().await;
                match event {
                    ChatServerEvent::RoomHistory { messages, .. } => tl.load_history(messages),
                    ChatServerEvent::NewMessage { message } => tl.apply_broadcast(message),
                    ChatServerEvent::SendAck {
                        ok,
                        message,
                        client_message_id,
                        ..
                    } => tl.apply_ack(ok, message, client_message_id),
                    ChatServerEvent::SystemMessage { text, .. } => tl.push_system_line(&text),
                    ChatServerEvent::HeartbeatAck { .. } => {}
                }
            }
        });
    }
}

/// Arm the per-message ack timer. The timer never cancels the send — firing
/// after resolution is a no-op inside [`Timeline::apply_timeout`].
fn schedule_ack_timeout(timeline: Arc<Mutex<Timeline>>, client_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(ACK_TIMEOUT).await;
        timeline.lock().await.apply_timeout(&client_id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_message(room: &str, user: &str, text: &str) -> ChatMessage {
        let now = Utc::now();
        ChatMessage {
            id: Uuid::now_v7(),
            room_id: room.into(),
            user_name: user.into(),
            text: text.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ack_resolves_pending_entry() {
        let mut tl = Timeline::new();
        let cid = tl.begin_send("Ava", "hello", Utc::now());

        let saved = server_message("nst-commons", "Ava", "hello");
        tl.apply_ack(true, Some(saved.clone()), Some(cid));

        // Exactly one non-pending "hello" entry, carrying the server id
        let hellos: Vec<_> = tl.entries().iter().filter(|e| e.text == "hello").collect();
        assert_eq!(hellos.len(), 1);
        assert_eq!(hellos[0].delivery, Delivery::Confirmed);
        assert_eq!(hellos[0].id, saved.id.to_string());
    }

    #[test]
    fn test_timeout_flags_unsaved_but_keeps_entry() {
        let mut tl = Timeline::new();
        let cid = tl.begin_send("Ava", "hello", Utc::now());

        tl.apply_timeout(&cid);

        assert_eq!(tl.entries().len(), 1);
        assert_eq!(tl.entries()[0].delivery, Delivery::Unconfirmed);
    }

    #[test]
    fn test_resolution_beats_timer() {
        let mut tl = Timeline::new();
        let cid = tl.begin_send("Ava", "hello", Utc::now());

        tl.apply_ack(true, Some(server_message("commons", "Ava", "hello")), Some(cid.clone()));
        tl.apply_timeout(&cid);

        assert_eq!(tl.entries()[0].delivery, Delivery::Confirmed);
    }

    #[test]
    fn test_failure_removes_entry_and_adds_error_line() {
        let mut tl = Timeline::new();
        let cid = tl.begin_send("Ava", "hello", Utc::now());

        tl.apply_ack(false, None, Some(cid));

        assert_eq!(tl.entries().len(), 1);
        let line = &tl.entries()[0];
        assert!(line.system);
        assert_eq!(line.text, "Message failed to send. Please retry.");
    }

    #[test]
    fn test_broadcast_heuristic_splices_instead_of_duplicating() {
        let mut tl = Timeline::new();
        tl.begin_send("Ava", "hello", Utc::now());

        // Same sender, same text, inside the window, no correlation id
        tl.apply_broadcast(server_message("commons", "Ava", "hello"));

        let hellos: Vec<_> = tl.entries().iter().filter(|e| e.text == "hello").collect();
        assert_eq!(hellos.len(), 1);
        assert_eq!(hellos[0].delivery, Delivery::Confirmed);
    }

    #[test]
    fn test_broadcast_outside_window_appends() {
        let mut tl = Timeline::new();
        tl.begin_send("Ava", "hello", Utc::now() - ChronoDuration::seconds(30));

        tl.apply_broadcast(server_message("commons", "Ava", "hello"));

        // Too old to be ours: the pending entry stays pending, the broadcast
        // appends as a separate line
        assert_eq!(tl.entries().len(), 2);
        assert_eq!(tl.entries()[0].delivery, Delivery::Pending);
        assert_eq!(tl.entries()[1].delivery, Delivery::Confirmed);
    }

    #[test]
    fn test_duplicate_ids_apply_once() {
        let mut tl = Timeline::new();
        let msg = server_message("commons", "Ben", "hi");

        tl.apply_broadcast(msg.clone());
        tl.apply_broadcast(msg);

        assert_eq!(tl.entries().len(), 1);
    }

    #[test]
    fn test_heuristic_matches_oldest_pending_candidate() {
        // Known ambiguity under rapid-fire identical texts: the oldest pending
        // entry wins, matching the historical observable behavior.
        let mut tl = Timeline::new();
        let first = tl.begin_send("Ava", "hello", Utc::now());
        let _second = tl.begin_send("Ava", "hello", Utc::now());

        tl.apply_broadcast(server_message("commons", "Ava", "hello"));

        let confirmed: Vec<_> = tl
            .entries()
            .iter()
            .filter(|e| e.delivery == Delivery::Confirmed)
            .collect();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].client_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_history_load_keeps_pending_entries() {
        let mut tl = Timeline::new();
        let cid = tl.begin_send("Ava", "still sending", Utc::now());

        tl.load_history(vec![
            server_message("commons", "Ben", "older"),
            server_message("commons", "Cal", "old"),
        ]);

        assert_eq!(tl.entries().len(), 3);
        let last = tl.entries().last().unwrap();
        assert_eq!(last.client_id.as_deref(), Some(cid.as_str()));
        assert_eq!(last.delivery, Delivery::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_timer_fires_after_seven_seconds() {
        let timeline = Arc::new(Mutex::new(Timeline::new()));
        let cid = timeline
            .lock()
            .await
            .begin_send("Ava", "hello", Utc::now());

        schedule_ack_timeout(timeline.clone(), cid.clone());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(timeline.lock().await.entries()[0].delivery, Delivery::Pending);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            timeline.lock().await.entries()[0].delivery,
            Delivery::Unconfirmed
        );
    }
}
