//! WebSocket layer of the push hub: upgrade, per-connection loop, frames.
//!
//! Each authenticated subject connects at `/ws/sse/{user_id}/?token=…` and
//! receives only the events addressed to it.

pub mod connection;
pub mod handler;
pub mod messages;
