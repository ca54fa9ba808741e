use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors surfaced by storage and the HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// A query failed. `context` names the operation that was running.
    Database {
        context: String,
        source: sqlx::Error,
    },
    /// The contact (or other resource) does not exist for this user.
    NotFound(String),
    /// Input failed validation.
    BadRequest(String),
    /// Missing or malformed `X-User-Id`.
    Unauthorized(String),
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database { .. } | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database { context, source } => write!(f, "{}: {}", context, source),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    /// JSON `{"error": ...}` body. Server-side failures are logged in full
    /// and answered with a generic message.
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Database { context, source } => {
                tracing::error!("✗ Database error while {}: {:?}", context, source);
                "Database error".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("✗ Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                "Unauthorized".to_string()
            }
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(source: sqlx::Error) -> Self {
        AppError::Database {
            context: "running a query".to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("Serialization failed: {}", err))
    }
}

/// Name the operation a failed query belonged to.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|source| AppError::Database {
            context: context.into(),
            source,
        })
    }
}
