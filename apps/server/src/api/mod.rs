//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod middleware;
pub mod routes;

use crate::{services::MetricsService, state::AppState};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();

    Router::new()
        .merge(routes::ops::ops_routes())
        .merge(routes::rda::rda_routes())
        .with_state(state)
        // Middleware (applied in reverse order)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(middleware::compression())
        .layer(middleware::cors(&cors_origins))
        .layer(DefaultBodyLimit::max(max_body_size))
}

/// Router exposing only `/health` and `/metrics`, for processes without the RDA API
pub fn metrics_router(metrics_service: Arc<MetricsService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_service)
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
}

/// Serve [`metrics_router`] until `shutdown` turns true or its sender is dropped.
pub async fn serve_metrics(
    listener: TcpListener,
    metrics_service: Arc<MetricsService>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, metrics_router(metrics_service))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
