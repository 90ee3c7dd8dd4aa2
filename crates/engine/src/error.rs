//! HTTP mapping for engine errors
//!
//! Request handlers that expose take/reassign/update return [`HandlerResult`]
//! so rejected operations reach the caller with a stable status and code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use deskflow_shared::DeskError;

/// Wrapper carrying a [`DeskError`] out of an axum handler
#[derive(Debug)]
pub struct ErrorResponse(pub DeskError);

pub type HandlerResult<T> = Result<T, ErrorResponse>;

impl From<DeskError> for ErrorResponse {
    fn from(err: DeskError) -> Self {
        Self(err)
    }
}

impl ErrorResponse {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match &self.0 {
            DeskError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.0.to_string()),
            DeskError::AlreadyAssigned => {
                (StatusCode::CONFLICT, "ALREADY_ASSIGNED", self.0.to_string())
            }
            DeskError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            DeskError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "Database error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
