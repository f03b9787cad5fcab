//! WebSocket client for the video signaling relay.
//!
//! One connection per room session, deliberately without auto-reconnect:
//! negotiation failure is terminal per peer, and the recovery path is
//! rejoining the room — which is a fresh connection with a fresh peer id.
//!
//! Pair this with [`crate::mesh::PeerMesh`]: feed received events into the
//! mesh, execute the engine actions it returns, and relay the offers/answers/
//! candidates the media engine produces back through [`SignalClient::signal`].

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SdkError};
use crate::types::{SignalPayload, VideoClientEvent, VideoServerEvent};

const DEFAULT_SIGNAL: &str = "ws://localhost:8082/video";

/// Async video signaling client.
pub struct SignalClient {
    events: broadcast::Sender<VideoServerEvent>,
    commands: mpsc::Sender<VideoClientEvent>,
}

impl SignalClient {
    /// Connect to the signaling relay and spawn the IO task.
    pub async fn connect(signal_url: Option<&str>) -> Result<Self> {
        let url = signal_url.unwrap_or(DEFAULT_SIGNAL);
        let (ws, _) = connect_async(url).await?;
        let (mut sink, mut stream) = ws.split();

        let (events, _) = broadcast::channel::<VideoServerEvent>(256);
        let (commands_tx, mut commands_rx) = mpsc::channel::<VideoClientEvent>(64);

        let tx = events.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => match msg {
                        None | Some(Ok(Message::Close(_))) => break,
                        Some(Err(e)) => {
                            debug!("Signaling: transport error: {e}");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<VideoServerEvent>(&text) {
                                Ok(event) => { let _ = tx.send(event); }
                                Err(e) => debug!("Signaling: ignoring unparseable event: {e}"),
                            }
                        }
                        Some(Ok(_)) => {}
                    },
                    cmd = commands_rx.recv() => match cmd {
                        None => break,
                        Some(event) => {
                            let Ok(text) = serde_json::to_string(&event) else { continue };
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                    },
                }
            }
            debug!("Signaling: connection closed");
        });

        Ok(Self {
            events,
            commands: commands_tx,
        })
    }

    /// Subscribe to relay events. The channel closes when the transport does.
    pub fn subscribe(&self) -> broadcast::Receiver<VideoServerEvent> {
        self.events.subscribe()
    }

    /// Join a video room.
    pub async fn join(&self, room_id: &str, user_name: &str) -> Result<()> {
        self.send(VideoClientEvent::Join {
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
        })
        .await
    }

    /// Relay a negotiation payload to a single peer.
    pub async fn signal(
        &self,
        room_id: &str,
        target_id: Uuid,
        payload: &SignalPayload,
    ) -> Result<()> {
        self.send(VideoClientEvent::Signal {
            room_id: room_id.to_string(),
            target_id,
            data: serde_json::to_value(payload)?,
        })
        .await
    }

    /// Leave the video room.
    pub async fn leave(&self, room_id: &str) -> Result<()> {
        self.send(VideoClientEvent::Leave {
            room_id: room_id.to_string(),
        })
        .await
    }

    async fn send(&self, event: VideoClientEvent) -> Result<()> {
        self.commands
            .send(event)
            .await
            .map_err(|_| SdkError::NotConnected)
    }
}
