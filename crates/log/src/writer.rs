//! `io::Write` adapter that turns step output into leveled log records.

use memchr::{memchr, memmem, memrchr};
use std::io::{self, Write};

use crate::converter::convert_colored_string;
use crate::level::{Level, ansi};
use crate::logger::Logger;

const ESCAPE_START: &[u8] = b"\x1b[";

/// Size after which a colored message still waiting for its reset is logged
/// up to its last newline.
pub const MAX_BUFFERED_BYTES: usize = 64 * 1024;

/// Logs everything written to it through a [`Logger`].
///
/// Plain text is logged as it arrives. Text that starts with an escape
/// sequence is held until its reset arrives so the whole colored message can
/// be classified by [`convert_colored_string`]. A color that is never reset
/// holds output back only until [`MAX_BUFFERED_BYTES`] and a newline have
/// been seen.
#[derive(Debug)]
pub struct LogLevelWriter {
    logger: Logger,
    buffer: Vec<u8>,
}

impl LogLevelWriter {
    /// Wrap `logger`
    #[must_use]
    pub const fn new(logger: Logger) -> Self {
        Self {
            logger,
            buffer: Vec::new(),
        }
    }

    /// Log anything still buffered and hand back the logger.
    ///
    /// # Errors
    /// Returns an error if the logger fails.
    pub fn finish(mut self) -> io::Result<Logger> {
        self.flush_buffer()?;
        self.logger.flush()?;
        Ok(self.logger)
    }

    fn log(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        let (level, message) = convert_colored_string(&text);
        self.logger.log_message(&message, level)?;
        Ok(())
    }

    /// Log an oversized buffer through its last newline. Whatever follows is
    /// logged too unless it starts a new colored message.
    fn spill_buffer(&mut self) -> io::Result<()> {
        let Some(newline) = memrchr(b'\n', &self.buffer) else {
            return Ok(());
        };
        let rest = self.buffer.split_off(newline + 1);
        tracing::debug!(
            bytes = self.buffer.len(),
            "Colored output was never reset, logging it as is"
        );
        self.flush_buffer()?;
        if rest.starts_with(ESCAPE_START) {
            self.buffer = rest;
        } else if !rest.is_empty() {
            self.logger
                .log_message(&String::from_utf8_lossy(&rest), Level::Normal)?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffered = std::mem::take(&mut self.buffer);
        self.log(&buffered)
    }
}

impl Write for LogLevelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.buffer.is_empty() && !buf.starts_with(ESCAPE_START) {
            let text = String::from_utf8_lossy(buf);
            self.logger.log_message(&text, Level::Normal)?;
            return Ok(buf.len());
        }

        self.buffer.extend_from_slice(buf);
        if memmem::find(&self.buffer, ansi::RESET.as_bytes()).is_some() {
            self.flush_buffer()?;
        } else if self.buffer.len() > MAX_BUFFERED_BYTES && memchr(b'\n', buf).is_some() {
            self.spill_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.logger.flush()?;
        Ok(())
    }
}
