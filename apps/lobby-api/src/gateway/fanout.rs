//! Broadcast hub for relaying server events to connected clients.
//!
//! A single `tokio::sync::broadcast` channel carries every event. Each
//! connection subscribes once and filters locally against the set of lobbies
//! it has joined, so producers never track who is listening. A receiver that
//! falls behind sees `RecvError::Lagged` and skips ahead.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::ServerEvent;

const BROADCAST_CAPACITY: usize = 4096;

/// Delivery scope of a broadcast event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every connected client.
    Global,
    /// Only clients that created or joined the named lobby.
    Lobby(String),
}

/// An event paired with its delivery scope.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    pub scope: Scope,
    pub event: ServerEvent,
}

impl BroadcastPayload {
    /// Whether a connection subscribed to `joined` lobbies should see this.
    pub fn matches(&self, joined: &HashSet<String>) -> bool {
        match &self.scope {
            Scope::Global => true,
            Scope::Lobby(lobby_id) => joined.contains(lobby_id),
        }
    }
}

/// Process-wide broadcast hub. Cheap to clone, shared through `AppState`.
#[derive(Clone)]
pub struct LobbyBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl LobbyBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the hub. Connections subscribe before they snapshot the
    /// lobby listing so no update can slip between the two.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Publish an event to every subscriber in scope.
    pub fn dispatch(&self, scope: Scope, event: ServerEvent) {
        // Err here only means there are no subscribers right now.
        let _ = self.sender.send(Arc::new(BroadcastPayload { scope, event }));
    }
}
