//! Repository functions — typed queries over the connection pool.

pub mod messages;
