use std::sync::Arc;

use axum::{
    extract::State, http::header::AUTHORIZATION, http::HeaderMap, response::IntoResponse,
    routing::post, Json, Router,
};
use serde_json::json;
use tracing::info;

use crate::auth;
use crate::error::ApiError;
use crate::state::CloudState;

// ---

pub fn router() -> Router<Arc<CloudState>> {
    // ---
    Router::new().route("/api/login", post(handler))
}

/// Handle `POST /api/login`.
///
/// Expects HTTP Basic credentials; a match against the credential table
/// yields `{"token": …}`, anything else is a 401.
async fn handler(
    State(state): State<Arc<CloudState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingCredentials)?;

    let (identity, secret) =
        auth::parse_basic_auth(header).ok_or(ApiError::MissingCredentials)?;

    let token = state.auth().login(&identity, &secret)?;
    info!(identity = %identity, "issued access token");

    Ok(Json(json!({ "token": token })))
}
