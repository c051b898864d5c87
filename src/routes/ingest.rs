use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::post, Extension, Json, Router};
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::state::CloudState;

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/data", post(handler))
}

/// Handle `POST /api/data`.
///
/// Body must be a JSON object holding a numeric `avg_temperature`. The
/// authenticated caller identity comes from the bearer middleware.
async fn handler(
    State(state): State<Arc<CloudState>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    debug!(node = %caller.0, "POST /api/data");
    state.ingest(&caller.0, payload)?;

    Ok(Json(json!({ "status": "success", "message": "data accepted" })))
}
