//! Operational routes: liveness, service info and Prometheus metrics

use crate::api::handlers::{metrics, ops};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn ops_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(ops::health_check))
        .route("/", get(ops::root))
        .route("/metrics", get(metrics::metrics_handler))
}
