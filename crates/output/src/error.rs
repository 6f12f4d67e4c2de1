//! Step output errors.

use runguard_log::LogError;
use runguard_redact::FilterError;
use std::io;
use thiserror::Error;

/// Errors raised by the step output chain.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The redaction stage failed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The logger failed.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The output failed.
    #[error("step output failed: {0}")]
    Io(#[from] io::Error),

    /// Output was written after close.
    #[error("step output writer is closed")]
    Closed,
}

impl From<OutputError> for io::Error {
    fn from(err: OutputError) -> Self {
        match err {
            OutputError::Filter(e) => e.into(),
            OutputError::Log(e) => e.into(),
            OutputError::Io(e) => e,
            OutputError::Closed => Self::new(io::ErrorKind::BrokenPipe, OutputError::Closed),
        }
    }
}

/// Result type for step output
pub type Result<T> = std::result::Result<T, OutputError>;
