//! Data models shared across Studyhall crates.

pub mod message;
pub mod room;
