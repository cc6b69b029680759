pub mod bots;
pub mod config;
pub mod gateway;
pub mod routes;
pub mod trivia;

use std::sync::Arc;

use bots::completions::CompletionClient;
use config::Config;
use gateway::fanout::LobbyBroadcast;
use gateway::registry::LobbyRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub lobbies: Arc<LobbyRegistry>,
    pub broadcast: Arc<LobbyBroadcast>,
    pub completions: Arc<CompletionClient>,
    pub config: Arc<Config>,
}
