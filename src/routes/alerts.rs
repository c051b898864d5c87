use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::Alert;
use crate::state::CloudState;

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/alerts", get(handler))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    limit: Option<usize>,
}

/// Handle `GET /api/alerts?limit=N` (default 10, newest entries).
async fn handler(
    Query(params): Query<AlertsQuery>,
    State(state): State<Arc<CloudState>>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    // ---
    let limit = params.limit.unwrap_or(10);
    Ok(Json(state.alerts(limit)?))
}
