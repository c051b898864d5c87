use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::error::ApiError;
use crate::state::CloudState;

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/predict/temperature", get(handler))
}

/// Handle `GET /api/predict/temperature`.
///
/// 400 until the trend model has enough data; afterwards three forecast
/// values and the overheating flag.
async fn handler(State(state): State<Arc<CloudState>>) -> Result<impl IntoResponse, ApiError> {
    // ---
    let forecast = state.predict()?;

    Ok(Json(json!({
        "predictions": forecast.predictions,
        "overheating_risk": forecast.overheating_risk,
        "timestamp": Utc::now(),
    })))
}
