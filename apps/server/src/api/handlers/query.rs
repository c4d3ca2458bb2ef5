//! Query handlers: `GET /rda`, `GET /rda/:patient_id`, `GET /rda/:patient_id/:encounter_id`

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde_json::Value as JsonValue;

use crate::{
    services::{PathSelector, QueryParams},
    state::AppState,
    Result,
};

/// Query string, with extraction failures rendered as a JSON 400.
type Params = std::result::Result<Query<QueryParams>, QueryRejection>;

async fn route(state: &AppState, path: PathSelector, params: Params) -> Result<Json<JsonValue>> {
    let Query(params) = params?;
    let outcome = state.query.route(path, &params).await?;
    Ok(Json(outcome.into_json()?))
}

/// Facility query with `?facility_id=`, otherwise a bounded scan
pub async fn list_rda(State(state): State<AppState>, params: Params) -> Result<Json<JsonValue>> {
    route(&state, PathSelector::none(), params).await
}

/// All records of one patient
pub async fn patient_rda(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    params: Params,
) -> Result<Json<JsonValue>> {
    route(&state, PathSelector::patient(patient_id), params).await
}

/// One record by composite key
pub async fn read_rda(
    State(state): State<AppState>,
    Path((patient_id, encounter_id)): Path<(String, String)>,
    params: Params,
) -> Result<Json<JsonValue>> {
    route(&state, PathSelector::record(patient_id, encounter_id), params).await
}
