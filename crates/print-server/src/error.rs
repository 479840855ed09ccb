//! Error types for the print server.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use thiserror::Error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// Referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Database error.
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for ServerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, .. } => ServerError::NotFound(format!("{} not found", entity)),
            DatabaseError::Validation(err) => ServerError::BadRequest(err.to_string()),
            err => ServerError::Database(err),
        }
    }
}

impl From<print_core::CoreError> for ServerError {
    fn from(err: print_core::CoreError) -> Self {
        ServerError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string()),
            ServerError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Require a non-empty query or body field.
pub fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ServerError::BadRequest(format!("{} is required", field))),
    }
}

/// Fallback for routes hit with an unsupported method.
pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}
