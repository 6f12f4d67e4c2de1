//! Error types for the redaction filter.

use std::io;
use thiserror::Error;

/// Errors raised by the redaction filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The wrapped writer failed; the error is passed through untouched.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The writer was already closed.
    #[error("write after close")]
    Closed,

    /// An earlier failure stopped the filter; nothing more is emitted.
    #[error("redaction filter stopped after an earlier failure")]
    Poisoned,

    /// Matching state was inconsistent. Nothing from the affected lines was
    /// emitted.
    #[error("internal redaction error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },

    /// The first-fragment automaton could not be built.
    #[error("failed to build secret matcher: {message}")]
    Automaton {
        /// Builder error message
        message: String,
    },

    /// A structured input did not have the expected shape.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },
}

impl FilterError {
    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<FilterError> for io::Error {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Io(e) => e,
            FilterError::Closed => Self::new(io::ErrorKind::BrokenPipe, err),
            other => Self::other(other),
        }
    }
}

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;
