//! Log levels, producers and their ANSI colors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ANSI escape sequences used to color levels on the console.
pub mod ansi {
    /// Error
    pub const RED: &str = "\u{1b}[31;1m";
    /// Warn
    pub const YELLOW: &str = "\u{1b}[33;1m";
    /// Info
    pub const BLUE: &str = "\u{1b}[34;1m";
    /// Done
    pub const GREEN: &str = "\u{1b}[32;1m";
    /// Debug
    pub const MAGENTA: &str = "\u{1b}[35;1m";
    /// Ends any color
    pub const RESET: &str = "\u{1b}[0m";
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Plain output
    #[default]
    Normal,
    /// Failure
    Error,
    /// Warning
    Warn,
    /// Informational
    Info,
    /// Success
    Done,
    /// Only shown when debug logging is enabled
    Debug,
}

impl Level {
    /// Levels that carry a color, in detection order.
    pub const COLORED: [Self; 5] = [Self::Error, Self::Warn, Self::Info, Self::Done, Self::Debug];

    /// Lowercase name as used in JSON records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Done => "done",
            Self::Debug => "debug",
        }
    }

    /// Console color of the level; normal output is not colored.
    #[must_use]
    pub const fn color(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Error => Some(ansi::RED),
            Self::Warn => Some(ansi::YELLOW),
            Self::Info => Some(ansi::BLUE),
            Self::Done => Some(ansi::GREEN),
            Self::Debug => Some(ansi::MAGENTA),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    /// The runner itself
    RunguardCli,
    /// A step's own output
    Step,
}

impl Producer {
    /// Name as used in log records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunguardCli => "runguard_cli",
            Self::Step => "step",
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of a logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerType {
    /// Human readable, colored
    #[default]
    Console,
    /// One JSON record per line
    Json,
}
