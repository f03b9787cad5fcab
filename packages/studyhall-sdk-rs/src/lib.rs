//! Studyhall client SDK for Rust.
//!
//! Everything a client needs to participate in the real-time core:
//!
//! - [`gateway::ChatGateway`] — reconnecting WebSocket connection to the chat
//!   relay
//! - [`chat::ChatSession`] — optimistic send timeline with ack/broadcast/
//!   timeout reconciliation
//! - [`signal::SignalClient`] + [`mesh::PeerMesh`] — video room signaling and
//!   the peer-mesh negotiation state machine
//! - [`rest::RestClient`] — authenticated REST access to the room catalog and
//!   the external productivity collaborators (tasks, notes, songs, leetcode)

pub mod chat;
pub mod error;
pub mod gateway;
pub mod mesh;
pub mod rest;
pub mod signal;
pub mod types;

pub use chat::ChatSession;
pub use error::{Result, SdkError};
pub use gateway::ChatGateway;
pub use mesh::PeerMesh;
pub use rest::RestClient;
pub use signal::SignalClient;
