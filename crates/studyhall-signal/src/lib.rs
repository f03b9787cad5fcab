//! # studyhall-signal
//!
//! Signaling relay for Studyhall's peer-mesh video rooms.
//!
//! 1. Client connects to /video
//! 2. Sends `Join` with a room id and display name
//! 3. Server replies with the current peer list; existing members get a
//!    `PeerConnected` announcement
//! 4. The *joiner* offers to every listed peer; peers only respond —
//!    join order decides who initiates, never timing
//! 5. Offers, answers, and ICE candidates relay through `Signal` envelopes
//!    addressed to exactly one peer
//! 6. `Leave` or transport loss removes the participant and announces
//!    `PeerDisconnected`
//!
//! This is intentionally separate from the chat gateway: video membership is
//! independent of chat membership, and the relay moves opaque envelopes
//! rather than persisted content. The server never terminates media.

pub mod protocol;
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
use futures_util::{SinkExt, StreamExt};
use protocol::{VideoClientEvent, VideoServerEvent};
use registry::SignalRegistry;
use std::sync::Arc;
use studyhall_common::room_event::RoomEvent;
use studyhall_common::validation::{normalize_room_id, validate_user_name};
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

/// Signaling relay state.
#[derive(Clone)]
pub struct SignalState {
    pub registry: SignalRegistry,
    pub broadcast: broadcast::Sender<RoomEvent>,
}

impl SignalState {
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(10_000);
        Self {
            registry: SignalRegistry::new(),
            broadcast,
        }
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the video signaling WebSocket router.
pub fn build_router(state: SignalState) -> Router {
    Router::new()
        .route("/video", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<SignalState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Handle a single signaling WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<SignalState>) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Uuid::new_v4();

    let (direct_tx, mut direct_rx) = mpsc::channel::<VideoServerEvent>(64);
    let current_room: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

    let mut broadcast_rx = state.broadcast.subscribe();

    tracing::debug!(conn = %conn_id, "Signaling WebSocket connected");

    // ── Sender task ──────────────────────────────────────────────────────────
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
                let event = match serde_json::from_str::<VideoClientEvent>(&text) {
                    Ok(ev) => ev,
                    Err(e) => {
                        let _ = direct_tx
                            .send(VideoServerEvent::Error {
                                code: 4000,
                                message: format!("Invalid message: {e}"),
                            })
                            .await;
                        continue;
                    }
                };

                match event {
                    VideoClientEvent::Join { room_id, user_name } => {
                        handle_join(&state, conn_id, &room_id, &user_name, &direct_tx, &current_room)
                            .await;
                    }

                    VideoClientEvent::Signal {
                        room_id,
                        target_id,
                        data,
                    } => {
                        relay_signal(&state, conn_id, &room_id, target_id, data).await;
                    }

                    VideoClientEvent::Leave { .. } => {
                        if let Some(p) = state.registry.leave(conn_id).await {
                            *current_room.write().await = None;
                            announce_disconnect(&state, &p.room_id, conn_id);
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────────
    if let Some(p) = state.registry.leave(conn_id).await {
        announce_disconnect(&state, &p.room_id, conn_id);
    }

    send_task.abort();
    tracing::debug!(conn = %conn_id, "Signaling WebSocket disconnected");
}

/// Join flow: membership (with implicit leave), peer list back to the joiner,
/// `PeerConnected` to everyone already there.
async fn handle_join(
    state: &Arc<SignalState>,
    conn_id: Uuid,
    room_id: &str,
    user_name: &str,
    direct_tx: &mpsc::Sender<VideoServerEvent>,
    current_room: &Arc<RwLock<Option<String>>>,
) {
    let config = studyhall_common::config::get();

    let (room_id, user_name) = match (
        normalize_room_id(room_id),
        validate_user_name(user_name, config.chat.max_user_name_length),
    ) {
        (Ok(r), Ok(u)) => (r, u),
        (Err(e), _) | (_, Err(e)) => {
            let _ = direct_tx
                .send(VideoServerEvent::Error {
                    code: 4001,
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    let (participant, existing, previous) =
        state.registry.join(conn_id, &room_id, &user_name).await;

    if let Some(prev) = previous.filter(|p| p.room_id != room_id) {
        announce_disconnect(state, &prev.room_id, conn_id);
    }

    *current_room.write().await = Some(room_id.clone());

    // Peer list excludes the joiner: it is the set the joiner must offer to.
    let _ = direct_tx
        .send(VideoServerEvent::Peers {
            room_id: room_id.clone(),
            peers: existing,
        })
        .await;

    let payload = serde_json::to_value(VideoServerEvent::PeerConnected {
        peer_id: conn_id,
        room_id: room_id.clone(),
        user_name: participant.user_name,
    })
    .unwrap_or_default();
    let _ = state
        .broadcast
        .send(RoomEvent::to_room_except(&room_id, conn_id, payload));
}

/// Forward an opaque payload to exactly one peer. A target that is not a
/// member of the room means the envelope is silently dropped — the sender's
/// negotiation for that peer simply times out.
async fn relay_signal(
    state: &Arc<SignalState>,
    conn_id: Uuid,
    room_id: &str,
    target_id: Uuid,
    data: serde_json::Value,
) {
    let Ok(room_id) = normalize_room_id(room_id) else {
        return;
    };

    if !state.registry.is_member(conn_id, &room_id).await {
        tracing::debug!(conn = %conn_id, room = %room_id, "Dropping signal from non-member");
        return;
    }
    if !state.registry.is_member(target_id, &room_id).await {
        tracing::debug!(target = %target_id, room = %room_id, "Dropping signal for absent target");
        return;
    }

    let payload = serde_json::to_value(VideoServerEvent::Signal {
        from: conn_id,
        room_id: room_id.clone(),
        data,
    })
    .unwrap_or_default();
    let _ = state
        .broadcast
        .send(RoomEvent::to_target(&room_id, target_id, payload));
}

/// Tell the remaining members a peer is gone.
fn announce_disconnect(state: &SignalState, room_id: &str, peer_id: Uuid) {
    let payload = serde_json::to_value(VideoServerEvent::PeerDisconnected {
        peer_id,
        room_id: room_id.to_string(),
    })
    .unwrap_or_default();
    let _ = state
        .broadcast
        .send(RoomEvent::to_room(room_id, payload));
}
