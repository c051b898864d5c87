use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::IngestedRecord;
use crate::state::CloudState;

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/history", get(handler))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Handle `GET /api/history?limit=N`.
///
/// Returns the most recent `limit` ingested records (default 50),
/// insertion order preserved.
async fn handler(
    Query(params): Query<HistoryQuery>,
    State(state): State<Arc<CloudState>>,
) -> Result<Json<Vec<IngestedRecord>>, ApiError> {
    // ---
    let limit = params.limit.unwrap_or(50);
    Ok(Json(state.history(limit)?))
}
