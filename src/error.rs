//! Error types for the chatlog-style library.
//!
//! Fatal conditions (storage, I/O, configuration) surface as [`ChatStyleError`].
//! Recoverable per-line and per-author conditions have their own small enums in
//! [`crate::parser`] and [`crate::aggregate`] so they can be counted and skipped
//! without ever reaching this type.

use thiserror::Error;

/// Errors that abort a pipeline stage.
#[derive(Error, Debug)]
pub enum ChatStyleError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors, including failures while decoding the log stream
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input that cannot be processed as a whole (e.g. too few authors to cluster)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored row that does not match the expected schema
    #[error("Malformed stored row: {0}")]
    MalformedRow(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with ChatStyleError
pub type Result<T> = std::result::Result<T, ChatStyleError>;

impl From<anyhow::Error> for ChatStyleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<config::ConfigError> for ChatStyleError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.log");
        let err: ChatStyleError = io.into();
        assert!(matches!(err, ChatStyleError::Io(_)));
        assert!(err.to_string().contains("missing.log"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_message() {
        let err: ChatStyleError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
