//! Metrics endpoint handler
//!
//! Exposes Prometheus-compatible metrics for monitoring

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use crate::services::MetricsService;

/// Handler for /metrics endpoint
/// Returns Prometheus text format metrics
///
/// Mounted by both binaries; each exposes its own process registry.
pub async fn metrics_handler(
    State(metrics_service): State<Arc<MetricsService>>,
) -> impl IntoResponse {
    // Refresh sampled gauges before gathering
    let custom_metrics = metrics_service
        .collect_custom_metrics(env!("CARGO_PKG_VERSION"))
        .await;

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => {
            buffer.extend_from_slice(custom_metrics.as_bytes());
            (
                StatusCode::OK,
                [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
                buffer,
            )
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}
