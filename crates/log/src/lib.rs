//! Step and runner logging.
//!
//! A [`Logger`] formats messages for the console (colored, optionally
//! timestamped) or as JSON lines. [`LogLevelWriter`] sits in front of a
//! logger and recovers the level of step output from its ANSI colors, so a
//! step printing `\x1b[31;1m...\x1b[0m` produces an `error` record.

pub mod console;
pub mod converter;
pub mod error;
pub mod json;
pub mod level;
pub mod logger;
pub mod writer;

pub use console::ConsoleLogger;
pub use converter::convert_colored_string;
pub use error::{LogError, Result};
pub use json::JsonLogger;
pub use level::{Level, LoggerType, Producer, ansi};
pub use logger::{LogSink, Logger, LoggerOpts, MessageFields, TimeProvider};
pub use writer::LogLevelWriter;
