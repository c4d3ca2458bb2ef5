//! Liveness and service information

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "rda-pipeline"
    }))
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let queue = state.backends.queue.as_ref().map(|q| q.name().to_string());
    Json(json!({
        "server": "RDA Pipeline",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.config.backend,
        "queue": queue,
        "status": "running"
    }))
}
