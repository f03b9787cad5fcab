//! Reconnecting WebSocket client for the chat relay.
//!
//! Maintains the connection in a background task: capped exponential backoff
//! with jitter between attempts, automatic re-join of the last room after a
//! reconnect, periodic heartbeats while connected. Incoming events are fanned
//! out over a broadcast channel; outgoing events queue over an mpsc channel
//! and survive short disconnects.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, warn};

use crate::error::{Result, SdkError};
use crate::types::{ChatClientEvent, ChatServerEvent, OutgoingMessage, UserRef};

const DEFAULT_GW: &str = "ws://localhost:8081/gateway";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const MAX_RECONNECT: u32 = 10;

/// Whether the connection loop should try again or stop for good.
enum LoopControl {
    Reconnect,
    Shutdown,
}

/// Async chat gateway client with auto-reconnect and heartbeat.
///
/// ```rust,no_run
/// use studyhall_sdk::gateway::ChatGateway;
///
/// #[tokio::main]
/// async fn main() -> studyhall_sdk::Result<()> {
///     let gw = ChatGateway::connect(None);
///     let mut events = gw.subscribe();
///     gw.join_room("commons", "Ava").await?;
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
///     Ok(())
/// }
/// ```
pub struct ChatGateway {
    events: broadcast::Sender<ChatServerEvent>,
    commands: mpsc::Sender<ChatClientEvent>,
}

impl ChatGateway {
    /// Spawn the background connection task and return the handle.
    pub fn connect(gateway_url: Option<&str>) -> Self {
        let url = gateway_url.unwrap_or(DEFAULT_GW).to_owned();
        let (events, _) = broadcast::channel(256);
        let (commands_tx, commands_rx) = mpsc::channel(64);

        let tx = events.clone();
        tokio::spawn(async move {
            run(url, tx, commands_rx).await;
        });

        Self {
            events,
            commands: commands_tx,
        }
    }

    /// Subscribe to server events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatServerEvent> {
        self.events.subscribe()
    }

    /// Join a room (implicitly leaving the current one). Re-sent
    /// automatically after a reconnect.
    pub async fn join_room(&self, room_id: &str, user_name: &str) -> Result<()> {
        self.send(ChatClientEvent::JoinRoom {
            room_id: room_id.to_string(),
            user: UserRef {
                name: user_name.to_string(),
            },
        })
        .await
    }

    /// Send a chat message.
    pub async fn send_message(&self, room_id: &str, message: OutgoingMessage) -> Result<()> {
        self.send(ChatClientEvent::SendMessage {
            room_id: room_id.to_string(),
            message,
        })
        .await
    }

    async fn send(&self, event: ChatClientEvent) -> Result<()> {
        self.commands
            .send(event)
            .await
            .map_err(|_| SdkError::NotConnected)
    }
}

/// Outer connection loop: run one connection to completion, back off, retry.
async fn run(
    url: String,
    tx: broadcast::Sender<ChatServerEvent>,
    mut commands: mpsc::Receiver<ChatClientEvent>,
) {
    let last_join: Arc<Mutex<Option<ChatClientEvent>>> = Arc::new(Mutex::new(None));
    let mut attempts = 0u32;

    loop {
        match run_once(&url, &tx, &mut commands, &last_join).await {
            Ok(LoopControl::Shutdown) => {
                debug!("Gateway: client dropped, stopping");
                return;
            }
            Ok(LoopControl::Reconnect) => {
                attempts = 0;
            }
            Err(e) => {
                attempts += 1;
                if attempts > MAX_RECONNECT {
                    error!("Gateway: max reconnect attempts reached: {e}");
                    return;
                }
                warn!("Gateway: disconnected ({e}), reconnecting (attempt {attempts})");
            }
        }

        let base = Duration::from_secs(u64::min(2u64.pow(attempts), 30));
        let jitter = Duration::from_millis(rand::rng().random_range(0..750));
        sleep(base + jitter).await;
    }
}

/// One connection lifetime: (re-)join, then pump frames both ways until the
/// transport drops or the client goes away.
async fn run_once(
    url: &str,
    tx: &broadcast::Sender<ChatServerEvent>,
    commands: &mut mpsc::Receiver<ChatClientEvent>,
    last_join: &Mutex<Option<ChatClientEvent>>,
) -> Result<LoopControl> {
    let (ws, _) = connect_async(url).await?;
    let (mut sink, mut stream) = ws.split();

    // Resume the room after a reconnect; the server replays history and the
    // timeline deduplicates by id.
    if let Some(join) = last_join.lock().await.clone() {
        sink.send(Message::Text(serde_json::to_string(&join)?.into()))
            .await?;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                None => return Ok(LoopControl::Reconnect),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChatServerEvent>(&text) {
                        Ok(event) => { let _ = tx.send(event); }
                        Err(e) => debug!("Gateway: ignoring unparseable event: {e}"),
                    }
                }
                Some(Ok(Message::Close(_))) => return Ok(LoopControl::Reconnect),
                Some(Ok(_)) => {}
            },
            cmd = commands.recv() => match cmd {
                None => return Ok(LoopControl::Shutdown),
                Some(event) => {
                    if matches!(event, ChatClientEvent::JoinRoom { .. }) {
                        *last_join.lock().await = Some(event.clone());
                    }
                    sink.send(Message::Text(serde_json::to_string(&event)?.into()))
                        .await?;
                }
            },
            _ = heartbeat.tick() => {
                let hb = ChatClientEvent::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                };
                sink.send(Message::Text(serde_json::to_string(&hb)?.into()))
                    .await?;
            }
        }
    }
}
