//! The writer a step's stdout and stderr are fed into.

use runguard_log::{LogLevelWriter, Logger, LoggerOpts};
use runguard_redact::{FilterConfig, RedactingWriter, SecretSet};
use std::io::{self, Write};
use std::sync::Arc;

use crate::error::{OutputError, Result};
use crate::error_finder::{ErrorFinder, ErrorMessages};

type Inner = ErrorFinder<LogLevelWriter>;

enum Chain {
    Plain(Inner),
    Redacting(RedactingWriter<Inner>),
}

/// Redacts secrets, extracts error blocks and logs step output.
///
/// ```text
/// write ─▶ RedactingWriter ─▶ ErrorFinder ─▶ LogLevelWriter ─▶ Logger ─▶ output
/// ```
///
/// The redaction stage is skipped when there are no secrets. Error messages
/// are collected after redaction, so they never contain a secret.
pub struct StepOutputWriter {
    chain: Option<Chain>,
    messages: ErrorMessages,
}

impl StepOutputWriter {
    /// Build the chain logging to `output`.
    ///
    /// # Errors
    /// Returns an error if the redaction stage cannot be started.
    pub fn new<W>(secrets: Arc<SecretSet>, opts: LoggerOpts, output: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        Self::with_config(secrets, opts, output, FilterConfig::default())
    }

    /// Build the chain with a custom redaction configuration.
    ///
    /// # Errors
    /// Returns an error if the redaction stage cannot be started.
    pub fn with_config<W>(
        secrets: Arc<SecretSet>,
        opts: LoggerOpts,
        output: W,
        config: FilterConfig,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let finder = ErrorFinder::new(LogLevelWriter::new(Logger::new(opts, output)));
        let messages = finder.messages();
        let chain = if secrets.is_empty() {
            Chain::Plain(finder)
        } else {
            tracing::debug!(secrets = secrets.len(), "Redacting step output");
            Chain::Redacting(RedactingWriter::with_config(secrets, finder, config)?)
        };
        Ok(Self {
            chain: Some(chain),
            messages,
        })
    }

    /// Feed step output into the chain.
    ///
    /// # Errors
    /// Returns [`OutputError::Closed`] after close, or the first failure of a
    /// stage.
    pub fn write_output(&mut self, buf: &[u8]) -> Result<()> {
        match self.chain.as_mut().ok_or(OutputError::Closed)? {
            Chain::Plain(finder) => finder.write_all(buf)?,
            Chain::Redacting(writer) => writer.write_bytes(buf)?,
        }
        Ok(())
    }

    /// Drain every stage and flush the output. Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns the first failure while draining.
    pub fn close(&mut self) -> Result<()> {
        let Some(chain) = self.chain.take() else {
            return Ok(());
        };
        let finder = match chain {
            Chain::Plain(finder) => finder,
            Chain::Redacting(writer) => writer.finish()?,
        };
        finder.into_inner().finish()?;
        tracing::debug!(errors = self.messages.len(), "Closed step output");
        Ok(())
    }

    /// Red error blocks seen so far. Blocks still open are only included
    /// after [`StepOutputWriter::close`].
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.messages.snapshot()
    }

    /// Shared handle to the collected error messages
    #[must_use]
    pub fn messages(&self) -> ErrorMessages {
        self.messages.clone()
    }
}

impl Write for StepOutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_output(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for StepOutputWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close step output on drop");
        }
    }
}

impl std::fmt::Debug for StepOutputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match &self.chain {
            Some(Chain::Plain(_)) => "plain",
            Some(Chain::Redacting(_)) => "redacting",
            None => "closed",
        };
        f.debug_struct("StepOutputWriter")
            .field("stage", &stage)
            .field("messages", &self.messages)
            .finish()
    }
}
