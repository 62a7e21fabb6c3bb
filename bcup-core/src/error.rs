/*!
Error types for the bcup core library.
*/

use thiserror::Error;

/// Result type used throughout bcup core.
pub type Result<T> = std::result::Result<T, BcupError>;

/// Errors that can occur during backup, listing and restore operations.
#[derive(Error, Debug)]
pub enum BcupError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression/decompression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompressed content is not JSON or matches none of the known backup shapes
    #[error("Invalid backup data: {0}")]
    InvalidBackupData(String),

    /// Referenced backup file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Required create/restore parameters are absent
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// The document database raised an error for the named collection or document
    #[error("Upstream failure for '{target}': {message}")]
    UpstreamFailure { target: String, message: String },

    /// A batch completed with some failed items
    #[error("{} of {} items failed: {}", failed.len(), succeeded + failed.len(), failed.join(", "))]
    PartialFailure { succeeded: usize, failed: Vec<String> },

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Credential or token exchange errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl BcupError {
    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid backup data error
    pub fn invalid_backup<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBackupData(msg.into())
    }

    pub fn missing_input<S: Into<String>>(msg: S) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Wrap a database error with the collection or document it concerns
    pub fn upstream<T: Into<String>, M: ToString>(target: T, message: M) -> Self {
        Self::UpstreamFailure {
            target: target.into(),
            message: message.to_string(),
        }
    }
}
