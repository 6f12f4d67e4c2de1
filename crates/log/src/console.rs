//! Human readable console output.

use chrono::{DateTime, Utc};
use std::io::Write;

use crate::error::Result;
use crate::level::{Level, ansi};
use crate::logger::{LogSink, MessageFields};

/// Layout of console timestamps.
pub const CONSOLE_TIME_FORMAT: &str = "%H:%M:%S";

/// Format `time` for the console prefix.
#[must_use]
pub fn console_timestamp(time: &DateTime<Utc>) -> String {
    time.format(CONSOLE_TIME_FORMAT).to_string()
}

/// Wrap `message` in the color of `level`.
#[must_use]
pub fn add_color(level: Level, message: &str) -> String {
    match level.color() {
        Some(color) => format!("{color}{message}{}", ansi::RESET),
        None => message.to_string(),
    }
}

/// Writes `[timestamp] producer producer_id <colored message>`.
#[derive(Debug)]
pub struct ConsoleLogger<W> {
    output: W,
}

impl<W: Write> ConsoleLogger<W> {
    /// Log to `output`
    pub const fn new(output: W) -> Self {
        Self { output }
    }

    /// Give back the output
    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write + Send> LogSink for ConsoleLogger<W> {
    fn log_message(&mut self, message: &str, fields: &MessageFields) -> Result<()> {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(timestamp) = &fields.timestamp {
            parts.push(format!("[{timestamp}]"));
        }
        if let Some(producer) = fields.producer {
            parts.push(producer.to_string());
        }
        if let Some(producer_id) = &fields.producer_id {
            parts.push(producer_id.clone());
        }
        if !message.is_empty() {
            parts.push(add_color(fields.level, message));
        }

        if parts.is_empty() {
            return Ok(());
        }
        self.output.write_all(parts.join(" ").as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}
