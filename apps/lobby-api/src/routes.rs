use axum::routing::get;
use axum::{Json, Router};

use crate::gateway;
use crate::AppState;

/// All HTTP routes: the health probe plus the gateway upgrade endpoint.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(gateway::server::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
