//! Logger errors.

use std::io;
use thiserror::Error;

/// Errors raised while writing log records.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log output failed.
    #[error("failed to write log message: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded.
    #[error("failed to encode log message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<LogError> for io::Error {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Io(e) => e,
            LogError::Encode(e) => Self::other(e),
        }
    }
}

/// Result type for logging
pub type Result<T> = std::result::Result<T, LogError>;
