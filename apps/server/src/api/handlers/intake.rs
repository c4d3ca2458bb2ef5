//! Intake handler: `POST /rda`

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::{request_context::RequestContext, state::AppState, Result};

/// Accept a document for asynchronous processing
///
/// The body is read as JSON whatever its content type. Returns 202 with the queue message id
/// once the document is queued.
pub async fn submit_rda(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let receipt = state.intake.submit(&body).await?;
    tracing::info!(
        request_id = %context.request_id,
        correlation_id = context.correlation_id.as_deref().unwrap_or(""),
        message_id = %receipt.message_id,
        patient_id = %receipt.patient_id,
        "RDA queued"
    );
    Ok((StatusCode::ACCEPTED, Json(receipt.to_json())))
}
