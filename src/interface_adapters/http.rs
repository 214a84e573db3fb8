// Shared HTTP response types for consistent API error payloads.

use crate::domain::ControlError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    // Human-readable error string for consistent JSON error responses.
    pub error: String,
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// Refused transitions leave the sandbox untouched; report them as conflicts.
impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self {
            ControlError::Session(_) | ControlError::Race(_) => StatusCode::CONFLICT,
            ControlError::UnknownBike(_) => StatusCode::NOT_FOUND,
        };
        error_response(status, self.to_string())
    }
}
