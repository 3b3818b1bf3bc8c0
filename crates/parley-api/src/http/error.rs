//! Application error type mapping the session taxonomy to HTTP responses.
//!
//! Client errors (unknown session, malformed input, engine rejection) map
//! to 4xx; transient infrastructure failures map to 502/503 so callers
//! know a retry is reasonable.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::error::SessionError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session operation errors.
    Session(SessionError),
    /// Request validation error caught at the transport layer.
    Validation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Session(SessionError::NotFound) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                "Session not found".to_string(),
            ),
            AppError::Session(SessionError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Session(SessionError::EngineRejected(msg)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ENGINE_REJECTED",
                msg.clone(),
            ),
            AppError::Session(SessionError::EngineUnavailable(msg)) => {
                (StatusCode::BAD_GATEWAY, "ENGINE_UNAVAILABLE", msg.clone())
            }
            AppError::Session(SessionError::StoreUnavailable(msg)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Session(SessionError::StoreRejected(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_REJECTED",
                msg.clone(),
            ),
            AppError::Session(SessionError::Inconsistency(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
        };

        let body = json!({
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
