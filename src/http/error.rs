//! JSON error responses for the HTTP boundary.

use crate::error::RelayError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    MethodNotAllowed,
    Relay(RelayError),
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError::Relay(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "Method not allowed" })),
            )
                .into_response(),
            ApiError::Relay(e @ (RelayError::InvalidRequest(_) | RelayError::MissingDoorState)) => {
                warn!("[HTTP] Rejected write: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid request", "details": e.to_string() })),
                )
                    .into_response()
            }
            ApiError::Relay(e) => {
                error!("[HTTP] Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to process request", "details": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
