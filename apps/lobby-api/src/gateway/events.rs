//! Wire-format events exchanged with gateway clients.
//!
//! Every frame is a JSON envelope of the form `{"event": <name>, "data": <payload>}`
//! with camelCase names on both sides. Unknown inbound event names fail to
//! parse and are skipped by the connection loop.

use serde::{Deserialize, Serialize};

/// A single entry in a lobby's message history.
///
/// `user` is a display name, not an authenticated identity: humans send
/// whatever name their client chose, bots use their minted `AI-` id, and
/// trivia posts under a fixed sentinel name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
}

/// One row of the lobby listing sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbySummary {
    pub id: String,
    pub participants: usize,
}

/// Client-to-server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    CreateLobby { lobby_id: String },
    #[serde(rename_all = "camelCase")]
    JoinLobby { lobby_id: String },
    #[serde(rename_all = "camelCase")]
    AddBot { lobby_id: String },
    #[serde(rename_all = "camelCase")]
    Message {
        lobby_id: String,
        user: String,
        text: String,
    },
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full lobby listing, in creation order.
    LobbyList(Vec<LobbySummary>),
    /// Human-readable notice (joins, bot arrivals).
    System(String),
    /// A committed chat message (human or trivia).
    Message(ChatMessage),
    /// One incremental delta of an in-flight bot reply.
    BotTyping { text: String },
    /// The finalized bot reply.
    BotMessage(ChatMessage),
}
