//! Error types for the change-tracking engine

use thiserror::Error;

/// Result type alias for redline operations
pub type RedlineResult<T> = Result<T, RedlineError>;

/// Main error type for the change-tracking engine
///
/// Absence of a change set or file entry is not an error: lookups return
/// `Option` so callers can render "nothing to show". Patch conflicts are
/// reported as an `applied=false` revert outcome, not through this type.
#[derive(Error, Debug, Clone)]
pub enum RedlineError {
    /// Page path failed validation (traversal, absolute, or malformed)
    #[error("Invalid page path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Caller-supplied value outside the accepted domain
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Storage/persistence errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl RedlineError {
    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an IO error with message
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    /// Create an IO error carrying the offending path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a JSON error
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RedlineError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for RedlineError {
    fn from(error: serde_json::Error) -> Self {
        Self::json(error.to_string())
    }
}
