use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::error::ApiError;
use crate::state::{CloudState, StatusSummary};

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/status", get(handler))
}

/// Handle `GET /api/status`: record count, alert counts by severity and the
/// last record's timestamp/temperature (nulls before the first ingest).
async fn handler(State(state): State<Arc<CloudState>>) -> Result<Json<StatusSummary>, ApiError> {
    // ---
    Ok(Json(state.status()?))
}
