//! Metrics collection for the RDA pipeline
//!
//! This module defines the Prometheus metrics exported by the server and the worker.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec,
};

lazy_static! {
    // HTTP Request Metrics

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "rda_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    /// In-flight HTTP requests
    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "rda_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    /// HTTP request body size in bytes
    pub static ref HTTP_REQUEST_SIZE_BYTES: HistogramVec = register_histogram_vec!(
        "rda_http_request_size_bytes",
        "HTTP request body size in bytes",
        &["method", "path"],
        vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]
    )
    .expect("Failed to register HTTP_REQUEST_SIZE_BYTES");

    // Intake Metrics

    /// Intake submissions by outcome (accepted, malformed_input, validation_failure, publish_failure)
    pub static ref INTAKE_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_intake_submissions_total",
        "Total number of documents submitted to intake",
        &["result"]
    )
    .expect("Failed to register INTAKE_SUBMISSIONS_TOTAL");

    /// Validation errors by rule message
    pub static ref VALIDATION_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_validation_errors_total",
        "Total number of structural validation errors",
        &["error"]
    )
    .expect("Failed to register VALIDATION_ERRORS_TOTAL");

    // Queue Metrics

    /// Messages published
    pub static ref QUEUE_MESSAGES_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_queue_messages_sent_total",
        "Total number of messages published to the queue",
        &["queue"]
    )
    .expect("Failed to register QUEUE_MESSAGES_SENT_TOTAL");

    /// Messages waiting or in flight
    pub static ref QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        "rda_queue_depth",
        "Number of messages in the queue",
        &["state"]
    )
    .expect("Failed to register QUEUE_DEPTH");

    // Worker Metrics

    /// Completed worker batches
    pub static ref WORKER_BATCHES_TOTAL: IntCounter = register_int_counter!(
        "rda_worker_batches_total",
        "Total number of batches processed by the worker"
    )
    .expect("Failed to register WORKER_BATCHES_TOTAL");

    /// Messages per received batch
    pub static ref WORKER_BATCH_SIZE: Histogram = register_histogram!(
        "rda_worker_batch_size",
        "Number of messages received per batch",
        vec![0.0, 1.0, 2.0, 5.0, 10.0]
    )
    .expect("Failed to register WORKER_BATCH_SIZE");

    /// Messages handled by the worker, by status (processed, error)
    pub static ref WORKER_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_worker_messages_total",
        "Total number of messages handled by the worker",
        &["status"]
    )
    .expect("Failed to register WORKER_MESSAGES_TOTAL");

    /// Worker message errors by reason
    pub static ref WORKER_MESSAGE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_worker_message_errors_total",
        "Total number of messages the worker failed to process",
        &["reason"]
    )
    .expect("Failed to register WORKER_MESSAGE_ERRORS_TOTAL");

    /// Per-message processing duration
    pub static ref WORKER_MESSAGE_DURATION_SECONDS: Histogram = register_histogram!(
        "rda_worker_message_duration_seconds",
        "Message processing duration in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register WORKER_MESSAGE_DURATION_SECONDS");

    // Store Metrics

    /// Store upserts by status
    pub static ref STORE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_store_writes_total",
        "Total number of document store upserts",
        &["status"]
    )
    .expect("Failed to register STORE_WRITES_TOTAL");

    /// Records currently in the store
    pub static ref STORE_RECORDS: IntGauge = register_int_gauge!(
        "rda_store_records",
        "Number of records in the document store"
    )
    .expect("Failed to register STORE_RECORDS");

    // Query Metrics

    /// Query requests by route (item, patient, facility, scan) and outcome
    pub static ref QUERY_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rda_query_requests_total",
        "Total number of query requests",
        &["route", "status"]
    )
    .expect("Failed to register QUERY_REQUESTS_TOTAL");

    /// Records returned per query
    pub static ref QUERY_RESULTS: HistogramVec = register_histogram_vec!(
        "rda_query_results",
        "Number of records returned by a query",
        &["route"],
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    )
    .expect("Failed to register QUERY_RESULTS");

    // Database Metrics

    /// Active database connections
    pub static ref DB_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "rda_db_connections_active",
        "Number of active database connections"
    )
    .expect("Failed to register DB_CONNECTIONS_ACTIVE");

    /// Idle database connections
    pub static ref DB_CONNECTIONS_IDLE: IntGauge = register_int_gauge!(
        "rda_db_connections_idle",
        "Number of idle database connections"
    )
    .expect("Failed to register DB_CONNECTIONS_IDLE");
}

/// Helper to sanitize path for metrics labels (remove IDs, limit cardinality)
pub fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => "/".to_string(),
        ["rda"] => "/rda".to_string(),
        ["rda", _] => "/rda/{patient_id}".to_string(),
        ["rda", _, _] => "/rda/{patient_id}/{encounter_id}".to_string(),
        ["health"] => "/health".to_string(),
        ["metrics"] => "/metrics".to_string(),
        _ => "/other".to_string(),
    }
}
