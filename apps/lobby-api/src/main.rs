use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lobby_api::bots::completions::CompletionClient;
use lobby_api::config::Config;
use lobby_api::gateway::fanout::LobbyBroadcast;
use lobby_api::gateway::registry::LobbyRegistry;
use lobby_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present; env vars may already be set externally.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let completions = CompletionClient::new(&config);

    tracing::info!(
        model = %config.completion_model,
        provider = %config.openrouter_url,
        "lobby-api configured"
    );

    let state = AppState {
        lobbies: Arc::new(LobbyRegistry::new()),
        broadcast: Arc::new(LobbyBroadcast::new()),
        completions: Arc::new(completions),
        config: Arc::new(config),
    };

    // Trivia runs for the life of the process, across all lobbies.
    tokio::spawn(lobby_api::trivia::run(
        state.clone(),
        lobby_api::trivia::TRIVIA_INTERVAL,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(lobby_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "lobby-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
