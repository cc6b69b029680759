use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use parking_lot::Mutex;

use lobby_api::bots::completions::CompletionClient;
use lobby_api::config::Config;
use lobby_api::gateway::fanout::LobbyBroadcast;
use lobby_api::gateway::registry::LobbyRegistry;
use lobby_api::AppState;

/// Build an `AppState` pointed at the given completion provider.
pub fn test_state(provider_url: &str) -> AppState {
    let config = Config {
        openrouter_api_key: "test-key".to_string(),
        openrouter_url: provider_url.to_string(),
        completion_model: "anthropic/claude-3-sonnet-20240229".to_string(),
        port: 0,
    };
    AppState {
        lobbies: Arc::new(LobbyRegistry::new()),
        broadcast: Arc::new(LobbyBroadcast::new()),
        completions: Arc::new(CompletionClient::new(&config)),
        config: Arc::new(config),
    }
}

/// Start the real server on an ephemeral port. Returns (addr, state); the
/// server runs in the background.
pub async fn start_server(provider_url: &str) -> (SocketAddr, AppState) {
    let state = test_state(provider_url);
    let app = lobby_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Chunks streamed by the mock provider. Deliberately awkward: one frame is
/// split mid-JSON across chunks, one line is a keep-alive, one payload is
/// malformed, one delta is empty, and the stream ends with the [DONE] marker.
const MOCK_STREAM: &[&str] = &[
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"cont",
    "ent\":\"lo\"}}]}\n\n: keep-alive\n\n",
    "data: not json\n\n",
    "data: {\"choices\":[{\"delta\":{}}]}\n\n",
    "data: [DONE]\n\n",
];

/// What the mock stream's deltas concatenate to.
pub const MOCK_REPLY: &str = "Hello";

/// A stub completion endpoint that records request bodies and streams
/// [`MOCK_STREAM`] back with a small delay between chunks.
#[derive(Clone, Default)]
pub struct MockProvider {
    pub requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

pub async fn start_mock_provider() -> (String, MockProvider) {
    let provider = MockProvider::default();
    let app = Router::new()
        .route("/chat/completions", post(stream_reply))
        .with_state(provider.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), provider)
}

async fn stream_reply(
    State(provider): State<MockProvider>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    provider.requests.lock().push(body);

    let chunks = futures_util::stream::iter(
        MOCK_STREAM
            .iter()
            .map(|chunk| Ok::<_, std::convert::Infallible>(*chunk)),
    )
    .then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        chunk
    });

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(chunks),
    )
}

/// A provider that refuses every request with a 500.
pub async fn start_failing_provider() -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
