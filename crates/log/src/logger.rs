//! Leveled logger over a console or JSON sink.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::console::{ConsoleLogger, console_timestamp};
use crate::error::Result;
use crate::json::{JsonLogger, json_timestamp};
use crate::level::{Level, LoggerType, Producer};

/// Source of timestamps for log records.
pub type TimeProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Per-message metadata handed to a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFields {
    /// Already formatted timestamp
    pub timestamp: Option<String>,
    /// Producer of the message
    pub producer: Option<Producer>,
    /// Identifier of the producing step
    pub producer_id: Option<String>,
    /// Severity
    pub level: Level,
}

/// A destination for formatted log messages.
pub trait LogSink: Send {
    /// Write `message` with `fields`.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    fn log_message(&mut self, message: &str, fields: &MessageFields) -> Result<()>;

    /// Flush the output.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    fn flush(&mut self) -> Result<()>;
}

/// Logger configuration.
#[derive(Clone)]
pub struct LoggerOpts {
    /// Output format
    pub logger_type: LoggerType,
    /// Producer recorded in JSON output
    pub producer: Option<Producer>,
    /// Step identifier recorded in JSON output
    pub producer_id: Option<String>,
    /// Prefix console messages with `[HH:MM:SS]`
    pub console_timestamps: bool,
    /// Emit debug messages
    pub debug_enabled: bool,
    /// Clock
    pub time_provider: TimeProvider,
}

impl Default for LoggerOpts {
    fn default() -> Self {
        Self {
            logger_type: LoggerType::Console,
            producer: None,
            producer_id: None,
            console_timestamps: false,
            debug_enabled: false,
            time_provider: Arc::new(Utc::now),
        }
    }
}

impl fmt::Debug for LoggerOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOpts")
            .field("logger_type", &self.logger_type)
            .field("producer", &self.producer)
            .field("producer_id", &self.producer_id)
            .field("console_timestamps", &self.console_timestamps)
            .field("debug_enabled", &self.debug_enabled)
            .finish_non_exhaustive()
    }
}

impl LoggerOpts {
    /// Set the output format
    #[must_use]
    pub const fn with_logger_type(mut self, logger_type: LoggerType) -> Self {
        self.logger_type = logger_type;
        self
    }

    /// Set the producer
    #[must_use]
    pub const fn with_producer(mut self, producer: Producer) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Set the producer id
    #[must_use]
    pub fn with_producer_id(mut self, producer_id: impl Into<String>) -> Self {
        self.producer_id = Some(producer_id.into());
        self
    }

    /// Enable console timestamps
    #[must_use]
    pub const fn with_console_timestamps(mut self, enabled: bool) -> Self {
        self.console_timestamps = enabled;
        self
    }

    /// Enable debug messages
    #[must_use]
    pub const fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    /// Set the clock
    #[must_use]
    pub fn with_time_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.time_provider = Arc::new(provider);
        self
    }
}

/// Leveled logger.
///
/// The per-level helpers terminate the message with a newline;
/// [`Logger::log_message`] writes the message as given.
pub struct Logger {
    opts: LoggerOpts,
    sink: Box<dyn LogSink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Create a logger writing to `output` in the format chosen by `opts`.
    pub fn new<W: Write + Send + 'static>(opts: LoggerOpts, output: W) -> Self {
        let sink: Box<dyn LogSink> = match opts.logger_type {
            LoggerType::Console => Box::new(ConsoleLogger::new(output)),
            LoggerType::Json => Box::new(JsonLogger::new(output)),
        };
        Self { opts, sink }
    }

    /// Create a logger over a custom sink.
    #[must_use]
    pub fn with_sink(opts: LoggerOpts, sink: Box<dyn LogSink>) -> Self {
        Self { opts, sink }
    }

    /// The configuration
    #[must_use]
    pub const fn opts(&self) -> &LoggerOpts {
        &self.opts
    }

    /// Log an error line.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn error(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Error, message)
    }

    /// Log a warning line.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn warn(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Warn, message)
    }

    /// Log an info line.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn info(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Info, message)
    }

    /// Log a success line.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn done(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Done, message)
    }

    /// Log an uncolored line.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn print(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Normal, message)
    }

    /// Log a debug line if debug output is enabled.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn debug(&mut self, message: impl fmt::Display) -> Result<()> {
        self.log_line(Level::Debug, message)
    }

    /// Log `message` verbatim at `level`. Debug messages are dropped unless
    /// enabled.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn log_message(&mut self, message: &str, level: Level) -> Result<()> {
        if level == Level::Debug && !self.opts.debug_enabled {
            return Ok(());
        }
        let fields = self.message_fields(level);
        self.sink.log_message(message, &fields)
    }

    /// Flush the sink.
    ///
    /// # Errors
    /// Returns an error if the output fails.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    fn log_line(&mut self, level: Level, message: impl fmt::Display) -> Result<()> {
        self.log_message(&format!("{message}\n"), level)
    }

    fn message_fields(&self, level: Level) -> MessageFields {
        match self.opts.logger_type {
            LoggerType::Json => MessageFields {
                timestamp: Some(json_timestamp(&(self.opts.time_provider)())),
                producer: self.opts.producer,
                producer_id: self.opts.producer_id.clone(),
                level,
            },
            LoggerType::Console => MessageFields {
                timestamp: self
                    .opts
                    .console_timestamps
                    .then(|| console_timestamp(&(self.opts.time_provider)())),
                producer: None,
                producer_id: None,
                level,
            },
        }
    }
}
