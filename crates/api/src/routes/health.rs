use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Trader AI API Server" }))
}

/// Liveness check for ops scripts.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.trading_mode.to_string(),
    }))
}
