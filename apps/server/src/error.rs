//! Error types for the RDA pipeline

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Request body could not be parsed as JSON. Never queued.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Structural validation failed; carries every violated rule in order.
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailure(Vec<String>),

    /// Query string could not be interpreted.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The queue is unreachable or not configured. The document was not accepted.
    #[error("Publish failed: {0}")]
    PublishFailure(String),

    /// A single message could not be turned into a stored record.
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Polling the queue failed; the worker cannot make progress.
    #[error("Channel failure: {0}")]
    ChannelFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "malformed_input",
            Error::ValidationFailure(_) => "validation_failure",
            Error::InvalidQuery(_) => "invalid_query",
            Error::PublishFailure(_) => "publish_failure",
            Error::Processing(_) => "processing",
            Error::ChannelFailure(_) => "channel_failure",
            Error::NotFound(_) => "not_found",
            Error::Database(_) => "database",
            Error::Queue(_) => "queue",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
            Error::Other(_) => "other",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::MalformedInput(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON", "details": details }),
            ),
            Error::ValidationFailure(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid RDA", "details": errors }),
            ),
            Error::InvalidQuery(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid query", "details": details }),
            ),
            Error::NotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "RDA not found" }),
            ),
            Error::PublishFailure(details) => {
                tracing::error!(error = %self, "Document could not be queued");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Queue unavailable", "details": details }),
                )
            }
            Error::Processing(_)
            | Error::ChannelFailure(_)
            | Error::Database(_)
            | Error::Queue(_)
            | Error::Config(_)
            | Error::Internal(_)
            | Error::Other(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "details": self.kind() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidQuery(rejection.body_text())
    }
}
