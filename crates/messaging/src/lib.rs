//! # Messaging
//!
//! Direct text/image messages between two users, persisted in Postgres and
//! fanned out in real time to every open chat connection of the peers.

/// Live connection registry.
pub mod hub;
/// Message persistence and queries.
pub mod service;
/// Message models and socket events.
pub mod types;

pub use hub::{ChatHub, ConnectionId};
pub use service::{MessageError, MessageService, validate_message};
pub use types::*;
