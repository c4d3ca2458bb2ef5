//! RDA API Routes
//!
//! Path parameters are case-sensitive and percent-decoded as UTF-8 by the `Path` extractor.

use crate::api::handlers::{intake, query};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn rda_routes() -> Router<AppState> {
    Router::new()
        .route("/rda", get(query::list_rda).post(intake::submit_rda))
        .route("/rda/:patient_id", get(query::patient_rda))
        .route("/rda/:patient_id/:encounter_id", get(query::read_rda))
}
