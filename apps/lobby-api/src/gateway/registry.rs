//! In-memory lobby registry: participants, bots, and message history.
//!
//! All state lives in a sharded map guarded by short synchronous critical
//! sections. Methods never suspend and callers never hold a guard across an
//! await, so registry access cannot deadlock the connection loops.

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;

use crate::bots::completions::{ChatTurn, Role};

use super::events::{ChatMessage, LobbySummary};

/// Display name trivia posts under. Messages from this sender are kept in
/// history but excluded from bot context windows.
pub const TRIVIA_SENDER: &str = "💡 Trivia Bot";

/// Prefix shared by every minted bot id. Senders matching it are mapped to
/// the assistant role when history is replayed to the completion provider.
pub const BOT_PREFIX: &str = "AI-";

/// How many recent non-trivia messages are replayed per completion request.
const CONTEXT_WINDOW: usize = 6;

#[derive(Debug)]
struct Lobby {
    /// Connection ids of live human members, in join order.
    humans: Vec<String>,
    /// Bot display ids, in the order they were added. Bots never leave.
    bots: Vec<String>,
    history: Vec<ChatMessage>,
}

impl Lobby {
    fn participant_count(&self) -> usize {
        self.humans.len() + self.bots.len()
    }
}

/// Registry of every lobby in the process. Lobbies are created and mutated
/// freely but never evicted; an abandoned lobby keeps its bots and history.
pub struct LobbyRegistry {
    lobbies: DashMap<String, Lobby>,
    /// Creation order of lobby ids, for stable listings.
    order: Mutex<Vec<String>>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self {
            lobbies: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Create (or re-create) a lobby with the creator as its only member.
    ///
    /// Creating an id that already exists resets its members, bots, and
    /// history but keeps its position in the listing.
    pub fn create(&self, lobby_id: &str, conn_id: &str) {
        let lobby = Lobby {
            humans: vec![conn_id.to_string()],
            bots: Vec::new(),
            history: Vec::new(),
        };
        if self.lobbies.insert(lobby_id.to_string(), lobby).is_none() {
            self.order.lock().push(lobby_id.to_string());
        }
    }

    /// Add a connection to a lobby. Joining twice is coalesced; joining an
    /// unknown lobby is refused.
    pub fn join(&self, lobby_id: &str, conn_id: &str) -> bool {
        let Some(mut lobby) = self.lobbies.get_mut(lobby_id) else {
            return false;
        };
        if !lobby.humans.iter().any(|id| id == conn_id) {
            lobby.humans.push(conn_id.to_string());
        }
        true
    }

    /// Mint a bot id and attach it to the lobby. Returns the new id, or
    /// `None` for an unknown lobby.
    pub fn add_bot(&self, lobby_id: &str) -> Option<String> {
        let mut lobby = self.lobbies.get_mut(lobby_id)?;
        let bot_id = mint_bot_id();
        lobby.bots.push(bot_id.clone());
        Some(bot_id)
    }

    /// Snapshot the listing, in creation order. The count per lobby is live
    /// humans plus bots.
    pub fn list(&self) -> Vec<LobbySummary> {
        // Clone the order first; holding the order lock while touching the
        // map would pin two locks at once.
        let order = self.order.lock().clone();
        order
            .into_iter()
            .filter_map(|id| {
                let lobby = self.lobbies.get(&id)?;
                let participants = lobby.participant_count();
                Some(LobbySummary { id, participants })
            })
            .collect()
    }

    /// Drop a disconnected connection from every lobby it was a member of.
    /// Lobbies themselves survive, even when emptied.
    pub fn remove_participant(&self, conn_id: &str) {
        for mut entry in self.lobbies.iter_mut() {
            entry.humans.retain(|id| id != conn_id);
        }
    }

    /// Append a chat message to a lobby's history. Refused (with no side
    /// effects) when the lobby does not exist.
    pub fn post_message(&self, lobby_id: &str, message: ChatMessage) -> bool {
        let Some(mut lobby) = self.lobbies.get_mut(lobby_id) else {
            return false;
        };
        lobby.history.push(message);
        true
    }

    /// Commit a finalized bot reply to history. Tolerant of the lobby having
    /// vanished while the reply streamed.
    pub fn append_bot_reply(&self, lobby_id: &str, bot_id: &str, text: &str) {
        if let Some(mut lobby) = self.lobbies.get_mut(lobby_id) {
            lobby.history.push(ChatMessage {
                user: bot_id.to_string(),
                text: text.to_string(),
            });
        }
    }

    /// Append a trivia post under the trivia sentinel name.
    pub fn append_trivia(&self, lobby_id: &str, text: &str) -> bool {
        let Some(mut lobby) = self.lobbies.get_mut(lobby_id) else {
            return false;
        };
        lobby.history.push(ChatMessage {
            user: TRIVIA_SENDER.to_string(),
            text: text.to_string(),
        });
        true
    }

    /// Bot ids currently attached to a lobby.
    pub fn bot_ids(&self, lobby_id: &str) -> Vec<String> {
        self.lobbies
            .get(lobby_id)
            .map(|lobby| lobby.bots.clone())
            .unwrap_or_default()
    }

    /// Replay the most recent non-trivia history as role-tagged turns, oldest
    /// first: bot senders become `assistant`, everything else `user`.
    pub fn context_window(&self, lobby_id: &str) -> Option<Vec<ChatTurn>> {
        let lobby = self.lobbies.get(lobby_id)?;
        let mut turns: Vec<ChatTurn> = lobby
            .history
            .iter()
            .rev()
            .filter(|message| message.user != TRIVIA_SENDER)
            .take(CONTEXT_WINDOW)
            .map(|message| ChatTurn {
                role: if message.user.starts_with(BOT_PREFIX) {
                    Role::Assistant
                } else {
                    Role::User
                },
                content: message.text.clone(),
            })
            .collect();
        turns.reverse();
        Some(turns)
    }

    pub fn participant_count(&self, lobby_id: &str) -> Option<usize> {
        self.lobbies
            .get(lobby_id)
            .map(|lobby| lobby.participant_count())
    }

    /// Full history snapshot, empty for unknown lobbies.
    pub fn history(&self, lobby_id: &str) -> Vec<ChatMessage> {
        self.lobbies
            .get(lobby_id)
            .map(|lobby| lobby.history.clone())
            .unwrap_or_default()
    }

    /// Lobby ids in creation order.
    pub fn lobby_ids(&self) -> Vec<String> {
        self.order.lock().clone()
    }
}

/// Mint a bot display id: the bot prefix plus six lowercase base36 chars.
fn mint_bot_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();
    format!("{BOT_PREFIX}{suffix}")
}
