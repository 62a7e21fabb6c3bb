//! Error handling for the backup service.
//!
//! Maps library errors to HTTP status codes and the error envelope.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bcup_core::BcupError;
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const MISSING_INPUT: &str = "MISSING_INPUT";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_BACKUP: &str = "INVALID_BACKUP";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// A required parameter is absent
    MissingInput(String),
    /// A parameter is present but unusable
    Validation(String),
    /// Backup file not found
    NotFound(String),
    /// Backup file exists but cannot be decoded
    InvalidBackup(String),
    /// The document database failed
    Upstream(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingInput(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidBackup(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingInput(_) => codes::MISSING_INPUT,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::InvalidBackup(_) => codes::INVALID_BACKUP,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            AppError::MissingInput(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidBackup(msg)
            | AppError::Upstream(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<BcupError> for AppError {
    fn from(err: BcupError) -> Self {
        match err {
            BcupError::MissingInput(msg) => AppError::MissingInput(msg),
            BcupError::Validation(msg) => AppError::Validation(msg),
            BcupError::FileNotFound(file) => AppError::NotFound(format!("File not found: {file}")),
            BcupError::InvalidBackupData(msg) => AppError::InvalidBackup(format!("Invalid backup data: {msg}")),
            err @ (BcupError::UpstreamFailure { .. } | BcupError::PartialFailure { .. }) => {
                AppError::Upstream(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                AppError::MissingInput("Expected a JSON request body".to_string())
            }
            other => AppError::Validation(format!("Invalid request body: {}", other.body_text())),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            success: false,
            error: message.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.error_code(), self.message());
        (self.status_code(), Json(body)).into_response()
    }
}
