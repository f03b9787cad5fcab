//! API route modules.

pub mod admin;
pub mod health;
pub mod rooms;
