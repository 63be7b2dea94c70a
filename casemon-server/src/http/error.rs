//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use casemon_core::ValidationError;
use serde_json::json;

use crate::db::DbError;
use crate::ops::OpError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request rejected before any database work (400)
    InvalidInput(ValidationError),

    /// Missing or wrong webhook token (401)
    Unauthorized,

    /// Database statement or transaction failed (500, logged)
    Database(DbError),

    /// Health probe failed (503)
    Unhealthy(DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidInput(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "invalid_input",
                    "message": e.to_string()
                }),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "unauthorized",
                    "message": "invalid or missing webhook token"
                }),
            ),
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "database_error",
                        "message": e.to_string()
                    }),
                )
            }
            Self::Unhealthy(e) => {
                tracing::warn!(error = %e, "health probe failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "status": "unhealthy",
                        "detail": e.to_string()
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidInput(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        Self::Database(e)
    }
}

impl From<OpError> for ApiError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::InvalidInput(e) => Self::InvalidInput(e),
            OpError::Unauthorized => Self::Unauthorized,
            OpError::Database(e) => Self::Database(e),
        }
    }
}
