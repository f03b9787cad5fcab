//! Peer-mesh negotiation state machine.
//!
//! Every participant holds a direct connection to every other participant;
//! the relay only moves negotiation envelopes. Who calls whom is decided
//! once, at join time, never from timing:
//!
//! **The later joiner initiates the offer to all already-present peers;
//! existing peers only respond.** The `Peers` snapshot names who we offer
//! to; a `PeerConnected` announcement names a peer whose offer we wait for.
//! This asymmetry prevents glare (both sides offering at once).
//!
//! The machine is pure: it consumes signaling events and emits
//! [`EngineAction`]s for the embedding media engine (create a connection and
//! bind local tracks, produce/apply descriptions, apply candidates). It owns
//! no transport and no media. Candidates that arrive before the remote
//! description are queued per peer and flushed in arrival order the moment
//! the description lands — descriptions must precede candidates.
//!
//! Connection failure is terminal per peer: `disconnected`, `failed`, or
//! `closed` tears the peer state down and nothing retries. Rejoining the
//! room is the recovery path.

use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{PeerInfo, SignalPayload};

/// Negotiation phase of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// Known, no connection yet (announced peer whose offer we await).
    New,
    /// We initiated: offer sent, awaiting the answer.
    OfferSent,
    /// Their offer applied, our answer not yet produced.
    HaveRemoteOffer,
    /// Their offer applied and our answer sent.
    Answered,
    /// Media path established.
    Connected,
    /// Terminal; the peer is about to be removed.
    Closed,
}

/// Transport-level connection state reported by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Inputs to the mesh machine.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// The join reply: everyone already in the room. We offer to all of them.
    Peers { peers: Vec<PeerInfo> },
    /// Someone joined after us. We wait for their offer.
    PeerConnected { peer_id: Uuid, user_name: String },
    /// A relayed negotiation payload.
    Signal { from: Uuid, payload: SignalPayload },
    /// A peer left the room.
    PeerDisconnected { peer_id: Uuid },
    /// The media engine reports a connection state change.
    ConnectionState { peer_id: Uuid, state: TransportState },
}

/// Instructions for the embedding media engine, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Create the connection object and bind local media tracks if available.
    CreateConnection { peer_id: Uuid },
    /// Produce an offer for this peer and relay it.
    SendOffer { peer_id: Uuid },
    /// Apply the remote session offer.
    ApplyRemoteOffer { peer_id: Uuid, sdp: String },
    /// Produce an answer for this peer and relay it.
    SendAnswer { peer_id: Uuid },
    /// Apply the remote session answer.
    ApplyRemoteAnswer { peer_id: Uuid, sdp: String },
    /// Apply a transport candidate.
    ApplyCandidate {
        peer_id: Uuid,
        candidate: serde_json::Value,
    },
    /// Tear the connection down and drop its state.
    DestroyConnection { peer_id: Uuid },
}

/// Per-peer negotiation state.
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub peer_id: Uuid,
    pub user_name: Option<String>,
    pub phase: PeerPhase,
    /// Whether a remote description has been applied — the gate for
    /// candidates.
    remote_set: bool,
    /// Candidates received before the remote description, in arrival order.
    queued_candidates: Vec<serde_json::Value>,
}

impl PeerSession {
    fn new(peer_id: Uuid, user_name: Option<String>, phase: PeerPhase) -> Self {
        Self {
            peer_id,
            user_name,
            phase,
            remote_set: false,
            queued_candidates: Vec::new(),
        }
    }
}

/// The full mesh: one [`PeerSession`] per remote participant.
#[derive(Debug, Default)]
pub struct PeerMesh {
    peers: HashMap<Uuid, PeerSession>,
}

impl PeerMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer(&self, peer_id: Uuid) -> Option<&PeerSession> {
        self.peers.get(&peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Feed one event through the machine; returns the engine actions it
    /// produced, in execution order.
    pub fn handle(&mut self, event: MeshEvent) -> Vec<EngineAction> {
        match event {
            MeshEvent::Peers { peers } => self.on_peers(peers),
            MeshEvent::PeerConnected { peer_id, user_name } => {
                self.on_peer_connected(peer_id, user_name)
            }
            MeshEvent::Signal { from, payload } => match payload {
                SignalPayload::Offer { sdp } => self.on_offer(from, sdp),
                SignalPayload::Answer { sdp } => self.on_answer(from, sdp),
                SignalPayload::Candidate { candidate } => self.on_candidate(from, candidate),
            },
            MeshEvent::PeerDisconnected { peer_id } => self.remove_peer(peer_id),
            MeshEvent::ConnectionState { peer_id, state } => {
                self.on_connection_state(peer_id, state)
            }
        }
    }

    /// We just joined: offer to everyone already present.
    fn on_peers(&mut self, peers: Vec<PeerInfo>) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        for info in peers {
            self.peers.insert(
                info.peer_id,
                PeerSession::new(info.peer_id, Some(info.user_name), PeerPhase::OfferSent),
            );
            actions.push(EngineAction::CreateConnection { peer_id: info.peer_id });
            actions.push(EngineAction::SendOffer { peer_id: info.peer_id });
        }
        actions
    }

    /// A later joiner announced itself: record it, initiate nothing.
    fn on_peer_connected(&mut self, peer_id: Uuid, user_name: String) -> Vec<EngineAction> {
        self.peers
            .entry(peer_id)
            .or_insert_with(|| PeerSession::new(peer_id, None, PeerPhase::New))
            .user_name = Some(user_name);
        Vec::new()
    }

    /// Offer received: we are the responder. An unrecognized peer gets its
    /// connection created first, then the offer applies, an answer goes
    /// back, and any early-queued candidates flush in arrival order.
    fn on_offer(&mut self, from: Uuid, sdp: String) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        let session = self
            .peers
            .entry(from)
            .or_insert_with(|| PeerSession::new(from, None, PeerPhase::New));

        match session.phase {
            PeerPhase::New => {
                actions.push(EngineAction::CreateConnection { peer_id: from });
            }
            PeerPhase::OfferSent => {
                // We initiated towards this peer; by the join-order rule they
                // must not offer back. Ignore rather than glare.
                tracing::warn!(peer = %from, "Ignoring offer from a peer we initiated to");
                return actions;
            }
            _ => {
                tracing::debug!(peer = %from, phase = ?session.phase, "Ignoring duplicate offer");
                return actions;
            }
        }

        session.phase = PeerPhase::HaveRemoteOffer;
        session.remote_set = true;
        actions.push(EngineAction::ApplyRemoteOffer { peer_id: from, sdp });
        actions.push(EngineAction::SendAnswer { peer_id: from });
        session.phase = PeerPhase::Answered;

        for candidate in session.queued_candidates.drain(..) {
            actions.push(EngineAction::ApplyCandidate {
                peer_id: from,
                candidate,
            });
        }

        actions
    }

    /// Answer received: we initiated, the remote description is now set,
    /// queued candidates flush.
    fn on_answer(&mut self, from: Uuid, sdp: String) -> Vec<EngineAction> {
        let Some(session) = self.peers.get_mut(&from) else {
            tracing::debug!(peer = %from, "Ignoring answer from unknown peer");
            return Vec::new();
        };
        if session.phase != PeerPhase::OfferSent || session.remote_set {
            tracing::debug!(peer = %from, phase = ?session.phase, "Ignoring unexpected answer");
            return Vec::new();
        }

        session.remote_set = true;
        let mut actions = vec![EngineAction::ApplyRemoteAnswer { peer_id: from, sdp }];
        for candidate in session.queued_candidates.drain(..) {
            actions.push(EngineAction::ApplyCandidate {
                peer_id: from,
                candidate,
            });
        }
        actions
    }

    /// Candidate received: apply if the remote description exists, queue
    /// otherwise — descriptions must precede candidates.
    fn on_candidate(&mut self, from: Uuid, candidate: serde_json::Value) -> Vec<EngineAction> {
        let session = self
            .peers
            .entry(from)
            .or_insert_with(|| PeerSession::new(from, None, PeerPhase::New));

        if session.remote_set {
            vec![EngineAction::ApplyCandidate {
                peer_id: from,
                candidate,
            }]
        } else {
            session.queued_candidates.push(candidate);
            Vec::new()
        }
    }

    fn on_connection_state(&mut self, peer_id: Uuid, state: TransportState) -> Vec<EngineAction> {
        if state.is_terminal() {
            return self.remove_peer(peer_id);
        }
        if let Some(session) = self.peers.get_mut(&peer_id) {
            if state == TransportState::Connected {
                session.phase = PeerPhase::Connected;
            }
        }
        Vec::new()
    }

    /// Drop a peer and everything queued for it.
    fn remove_peer(&mut self, peer_id: Uuid) -> Vec<EngineAction> {
        if let Some(mut session) = self.peers.remove(&peer_id) {
            session.phase = PeerPhase::Closed;
            session.queued_candidates.clear();
            vec![EngineAction::DestroyConnection { peer_id }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer(name: &str) -> PeerInfo {
        PeerInfo {
            peer_id: Uuid::new_v4(),
            user_name: name.into(),
        }
    }

    #[test]
    fn test_later_joiner_offers_to_existing_peers() {
        // B joins second and receives A in the peers snapshot: B offers.
        let a = peer("Ava");
        let mut mesh_b = PeerMesh::new();

        let actions = mesh_b.handle(MeshEvent::Peers {
            peers: vec![a.clone()],
        });

        assert_eq!(
            actions,
            vec![
                EngineAction::CreateConnection { peer_id: a.peer_id },
                EngineAction::SendOffer { peer_id: a.peer_id },
            ]
        );
        assert_eq!(mesh_b.peer(a.peer_id).unwrap().phase, PeerPhase::OfferSent);
    }

    #[test]
    fn test_existing_peer_never_initiates() {
        // A joined first; B's arrival is announced. A must not offer.
        let b = Uuid::new_v4();
        let mut mesh_a = PeerMesh::new();
        mesh_a.handle(MeshEvent::Peers { peers: vec![] });

        let actions = mesh_a.handle(MeshEvent::PeerConnected {
            peer_id: b,
            user_name: "Ben".into(),
        });

        assert!(actions.is_empty());
        assert_eq!(mesh_a.peer(b).unwrap().phase, PeerPhase::New);
    }

    #[test]
    fn test_offer_from_unknown_peer_creates_connection_first() {
        let b = Uuid::new_v4();
        let mut mesh_a = PeerMesh::new();

        let actions = mesh_a.handle(MeshEvent::Signal {
            from: b,
            payload: SignalPayload::Offer { sdp: "v=0".into() },
        });

        assert_eq!(
            actions,
            vec![
                EngineAction::CreateConnection { peer_id: b },
                EngineAction::ApplyRemoteOffer {
                    peer_id: b,
                    sdp: "v=0".into()
                },
                EngineAction::SendAnswer { peer_id: b },
            ]
        );
        assert_eq!(mesh_a.peer(b).unwrap().phase, PeerPhase::Answered);
    }

    #[test]
    fn test_candidates_queue_until_description_then_flush_in_order() {
        let a = peer("Ava");
        let mut mesh_b = PeerMesh::new();
        mesh_b.handle(MeshEvent::Peers {
            peers: vec![a.clone()],
        });

        // Candidates land before the answer
        let c1 = json!({"candidate": "one"});
        let c2 = json!({"candidate": "two"});
        assert!(mesh_b
            .handle(MeshEvent::Signal {
                from: a.peer_id,
                payload: SignalPayload::Candidate { candidate: c1.clone() },
            })
            .is_empty());
        assert!(mesh_b
            .handle(MeshEvent::Signal {
                from: a.peer_id,
                payload: SignalPayload::Candidate { candidate: c2.clone() },
            })
            .is_empty());

        let actions = mesh_b.handle(MeshEvent::Signal {
            from: a.peer_id,
            payload: SignalPayload::Answer { sdp: "v=0".into() },
        });

        // Answer applies, then both candidates, original arrival order, none dropped
        assert_eq!(
            actions,
            vec![
                EngineAction::ApplyRemoteAnswer {
                    peer_id: a.peer_id,
                    sdp: "v=0".into()
                },
                EngineAction::ApplyCandidate {
                    peer_id: a.peer_id,
                    candidate: c1
                },
                EngineAction::ApplyCandidate {
                    peer_id: a.peer_id,
                    candidate: c2
                },
            ]
        );
    }

    #[test]
    fn test_candidate_after_description_applies_directly() {
        let b = Uuid::new_v4();
        let mut mesh_a = PeerMesh::new();
        mesh_a.handle(MeshEvent::Signal {
            from: b,
            payload: SignalPayload::Offer { sdp: "v=0".into() },
        });

        let c = json!({"candidate": "late"});
        let actions = mesh_a.handle(MeshEvent::Signal {
            from: b,
            payload: SignalPayload::Candidate { candidate: c.clone() },
        });

        assert_eq!(
            actions,
            vec![EngineAction::ApplyCandidate {
                peer_id: b,
                candidate: c
            }]
        );
    }

    #[test]
    fn test_terminal_transport_state_tears_peer_down() {
        let a = peer("Ava");
        let mut mesh_b = PeerMesh::new();
        mesh_b.handle(MeshEvent::Peers {
            peers: vec![a.clone()],
        });

        let actions = mesh_b.handle(MeshEvent::ConnectionState {
            peer_id: a.peer_id,
            state: TransportState::Failed,
        });

        assert_eq!(
            actions,
            vec![EngineAction::DestroyConnection { peer_id: a.peer_id }]
        );
        assert!(mesh_b.peer(a.peer_id).is_none());
        assert_eq!(mesh_b.peer_count(), 0);
    }

    #[test]
    fn test_peer_disconnect_cleans_up() {
        let b = Uuid::new_v4();
        let mut mesh_a = PeerMesh::new();
        mesh_a.handle(MeshEvent::Signal {
            from: b,
            payload: SignalPayload::Offer { sdp: "v=0".into() },
        });

        let actions = mesh_a.handle(MeshEvent::PeerDisconnected { peer_id: b });

        assert_eq!(
            actions,
            vec![EngineAction::DestroyConnection { peer_id: b }]
        );
        assert!(mesh_a.peer(b).is_none());
    }

    #[test]
    fn test_connected_state_marks_peer_connected() {
        let a = peer("Ava");
        let mut mesh_b = PeerMesh::new();
        mesh_b.handle(MeshEvent::Peers {
            peers: vec![a.clone()],
        });
        mesh_b.handle(MeshEvent::Signal {
            from: a.peer_id,
            payload: SignalPayload::Answer { sdp: "v=0".into() },
        });

        mesh_b.handle(MeshEvent::ConnectionState {
            peer_id: a.peer_id,
            state: TransportState::Connected,
        });

        assert_eq!(mesh_b.peer(a.peer_id).unwrap().phase, PeerPhase::Connected);
    }
}
