//! API error taxonomy for the cloud service.
//!
//! Each variant names a rejection the HTTP surface can produce and carries
//! its status mapping: authentication failures are 401, malformed or
//! insufficient requests are 400. Handlers return `Result<_, ApiError>` and
//! the conversion to a response happens in one place.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use thiserror::Error;

use crate::predictor::PredictError;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    // ---
    /// No usable credentials on a login request.
    #[error("credentials were not provided")]
    MissingCredentials,

    /// Identity/secret pair did not match the credential table.
    #[error("invalid identity or secret")]
    InvalidCredentials,

    /// Bearer token absent, malformed, badly signed or expired.
    #[error("token is invalid or has expired")]
    InvalidOrExpiredToken,

    /// A required ingestion field is absent or non-numeric.
    #[error("field `{0}` is required")]
    MissingField(&'static str),

    /// The trend window does not hold enough points to forecast.
    #[error("insufficient data for prediction")]
    InsufficientData,

    /// Unexpected server-side failure.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::MissingCredentials
            | ApiError::InvalidCredentials
            | ApiError::InvalidOrExpiredToken => StatusCode::UNAUTHORIZED,
            ApiError::MissingField(_) | ApiError::InsufficientData => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        // ---
        match err {
            PredictError::InsufficientData => ApiError::InsufficientData,
        }
    }
}
