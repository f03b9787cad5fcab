//! # studyhall-gateway
//!
//! Real-time WebSocket chat relay for Studyhall. Handles:
//! - Room membership (join with implicit leave, disconnect cleanup)
//! - History replay on join (bounded window, oldest → newest)
//! - Message persistence + fan-out to room members
//! - Direct send acknowledgements carrying the client correlation ID
//! - Heartbeat/keepalive
//!
//! The relay is the source of truth for who is in which room; message
//! history is the database's. Media never flows here — video rooms have
//! their own signaling relay in `studyhall-signal`.

pub mod events;
pub mod registry;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use events::{ChatClientEvent, ChatServerEvent};
use futures_util::{SinkExt, StreamExt};
use registry::RoomRegistry;
use std::sync::Arc;
use studyhall_common::room_event::RoomEvent;
use studyhall_common::validation::{normalize_room_id, validate_message_text, validate_user_name};
use studyhall_common::{ids, models::message::ChatMessage};
use studyhall_db::repository::messages;
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

/// Chat relay state.
#[derive(Clone)]
pub struct ChatState {
    /// Room membership registry — the only shared mutable state on this path.
    pub registry: RoomRegistry,
    /// Broadcast channel for fanning events out to connected clients.
    pub broadcast: broadcast::Sender<RoomEvent>,
    pub db: studyhall_db::Database,
}

impl ChatState {
    pub fn new(db: studyhall_db::Database) -> Self {
        let (broadcast, _) = broadcast::channel(10_000);
        Self {
            registry: RoomRegistry::new(),
            broadcast,
            db,
        }
    }
}

/// Build the chat relay WebSocket router.
pub fn build_router(state: ChatState) -> Router {
    Router::new()
        .route("/gateway", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ChatState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Handle a single chat WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<ChatState>) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Uuid::new_v4();

    // Direct-send channel: receive loop → sender task (history, acks, pongs)
    let (direct_tx, mut direct_rx) = mpsc::channel::<ChatServerEvent>(64);

    // Room filter shared with the sender task; updated on join
    let current_room: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

    // Subscribe to broadcast BEFORE spawning tasks so we don't miss events
    let mut broadcast_rx = state.broadcast.subscribe();

    tracing::debug!(conn = %conn_id, "Chat WebSocket connected");

    // ── Sender task ──────────────────────────────────────────────────────────
    // Merges room broadcasts (filtered to this connection's room) and direct
    // replies onto the single WebSocket sender.
    let room_filter = current_room.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = broadcast_rx.recv() => {
                    let room = room_filter.read().await;
                    if !event.should_deliver(conn_id, room.as_deref()) {
                        continue;
                    }
                    drop(room);

                    let Ok(text) = serde_json::to_string(&event.payload) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(direct) = direct_rx.recv() => {
                    let Ok(text) = serde_json::to_string(&direct) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    // ── Receive loop ─────────────────────────────────────────────────────────
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(event) = serde_json::from_str::<ChatClientEvent>(&text) else {
                    tracing::debug!(conn = %conn_id, "Ignoring malformed chat event");
                    continue;
                };
                match event {
                    ChatClientEvent::JoinRoom { room_id, user } => {
                        handle_join(&state, conn_id, &room_id, &user.name, &direct_tx, &current_room)
                            .await;
                    }

                    ChatClientEvent::SendMessage { room_id, message } => {
                        handle_send(
                            &state,
                            conn_id,
                            &room_id,
                            message.user_name,
                            message.text,
                            message.client_message_id,
                            &direct_tx,
                        )
                        .await;
                    }

                    ChatClientEvent::Heartbeat { .. } => {
                        let _ = direct_tx
                            .send(ChatServerEvent::HeartbeatAck {
                                timestamp: chrono::Utc::now().timestamp_millis(),
                            })
                            .await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────────
    if let Some(m) = state.registry.leave(conn_id).await {
        broadcast_notice(&state, &m.room_id, conn_id, format!("{} left the room", m.user_name));
    }

    send_task.abort();
    tracing::debug!(conn = %conn_id, "Chat WebSocket disconnected");
}

/// Join flow: normalize, implicit leave, membership, history snapshot,
/// join notice to the room (excluding the joiner).
async fn handle_join(
    state: &Arc<ChatState>,
    conn_id: Uuid,
    room_id: &str,
    user_name: &str,
    direct_tx: &mpsc::Sender<ChatServerEvent>,
    current_room: &Arc<RwLock<Option<String>>>,
) {
    let config = studyhall_common::config::get();

    let (room_id, user_name) = match (
        normalize_room_id(room_id),
        validate_user_name(user_name, config.chat.max_user_name_length),
    ) {
        (Ok(r), Ok(u)) => (r, u),
        (Err(e), _) | (_, Err(e)) => {
            let _ = direct_tx.send(ChatServerEvent::notice(e.to_string())).await;
            return;
        }
    };

    let (membership, previous) = state.registry.join(conn_id, &room_id, &user_name).await;

    // Tell the old room the user is gone (only on an actual room switch)
    if let Some(prev) = previous.filter(|p| p.room_id != room_id) {
        broadcast_notice(
            state,
            &prev.room_id,
            conn_id,
            format!("{} left the room", prev.user_name),
        );
    }

    // Update the sender-task filter before the history fetch: broadcasts that
    // land while we read the snapshot are deduplicated client-side by id.
    *current_room.write().await = Some(room_id.clone());

    let since = chrono::Utc::now() - chrono::Duration::days(config.chat.history_days);
    let history = match messages::list_recent_messages(&state.db.pool, &room_id, since).await {
        Ok(history) => history,
        Err(e) => {
            tracing::error!(room = %room_id, "Failed to load room history: {e}");
            let _ = direct_tx
                .send(ChatServerEvent::notice("Failed to load room history"))
                .await;
            Vec::new()
        }
    };

    let _ = direct_tx
        .send(ChatServerEvent::RoomHistory {
            room_id: room_id.clone(),
            messages: history,
        })
        .await;

    // The joiner's own reply is the history snapshot; the notice goes to
    // everyone else so it can never duplicate into that reply.
    broadcast_notice(
        state,
        &room_id,
        conn_id,
        format!("{} joined the room", membership.user_name),
    );
}

/// Send flow: membership check, validation, persistence, direct ack to the
/// sender, broadcast to every other member. Failures ack negatively and
/// persist/broadcast nothing.
async fn handle_send(
    state: &Arc<ChatState>,
    conn_id: Uuid,
    room_id: &str,
    user_name: String,
    text: String,
    client_message_id: Option<String>,
    direct_tx: &mpsc::Sender<ChatServerEvent>,
) {
    let config = studyhall_common::config::get();

    let room_id = match normalize_room_id(room_id) {
        Ok(r) => r,
        Err(e) => {
            let _ = direct_tx
                .send(ChatServerEvent::send_failure(client_message_id, e.to_string()))
                .await;
            return;
        }
    };

    if !state.registry.is_member(conn_id, &room_id).await {
        let _ = direct_tx
            .send(ChatServerEvent::send_failure(
                client_message_id,
                "Join the room before sending messages",
            ))
            .await;
        return;
    }

    let (user_name, text) = match (
        validate_user_name(&user_name, config.chat.max_user_name_length),
        validate_message_text(&text, config.chat.max_message_length),
    ) {
        (Ok(u), Ok(t)) => (u, t),
        (Err(e), _) | (_, Err(e)) => {
            let _ = direct_tx
                .send(ChatServerEvent::send_failure(client_message_id, e.to_string()))
                .await;
            return;
        }
    };

    let saved = match messages::create_message(
        &state.db.pool,
        ids::generate_id(),
        &room_id,
        &user_name,
        &text,
    )
    .await
    {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!(room = %room_id, "Failed to persist message: {e}");
            let _ = direct_tx
                .send(ChatServerEvent::send_failure(
                    client_message_id,
                    "Failed to save message",
                ))
                .await;
            return;
        }
    };

    broadcast_message(state, conn_id, &saved);

    let _ = direct_tx
        .send(ChatServerEvent::SendAck {
            ok: true,
            message: Some(saved),
            client_message_id,
            error: None,
        })
        .await;
}

/// Fan a persisted message out to every room member except the sender.
fn broadcast_message(state: &ChatState, sender: Uuid, message: &ChatMessage) {
    let payload = serde_json::to_value(ChatServerEvent::NewMessage {
        message: message.clone(),
    })
    .unwrap_or_default();
    let _ = state
        .broadcast
        .send(RoomEvent::to_room_except(&message.room_id, sender, payload));
}

/// Fan a system notice out to a room, excluding the connection it is about.
fn broadcast_notice(state: &ChatState, room_id: &str, about: Uuid, text: String) {
    let payload = serde_json::to_value(ChatServerEvent::notice(text)).unwrap_or_default();
    let _ = state
        .broadcast
        .send(RoomEvent::to_room_except(room_id, about, payload));
}
