//! JSON lines output.
//!
//! Every message becomes one record:
//!
//! ```text
//! {"timestamp":"...","type":"log","producer":"step","producer_id":"...","level":"info","message":"..."}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

use crate::error::Result;
use crate::level::{Level, Producer};
use crate::logger::{LogSink, MessageFields};

const LOG_MESSAGE_TYPE: &str = "log";

/// RFC 3339 with microsecond precision, trailing zeros of the fraction
/// dropped.
#[must_use]
pub fn json_timestamp(time: &DateTime<Utc>) -> String {
    let micros = time.to_rfc3339_opts(SecondsFormat::Micros, true);
    // "2022-01-01T01:01:01.120000Z" -> "2022-01-01T01:01:01.12Z"
    match micros.strip_suffix('Z').and_then(|s| s.split_once('.')) {
        Some((seconds, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{seconds}Z")
            } else {
                format!("{seconds}.{fraction}Z")
            }
        }
        None => micros,
    }
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    timestamp: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    producer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    producer_id: Option<&'a str>,
    level: Level,
    message: &'a str,
}

/// Writes one JSON record per message.
#[derive(Debug)]
pub struct JsonLogger<W> {
    output: W,
}

impl<W: Write> JsonLogger<W> {
    /// Log to `output`
    pub const fn new(output: W) -> Self {
        Self { output }
    }

    /// Give back the output
    pub fn into_inner(self) -> W {
        self.output
    }
}

/// Record describing a message that could not be encoded.
fn error_record(err: &serde_json::Error, timestamp: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": timestamp,
        "type": LOG_MESSAGE_TYPE,
        "producer": Producer::RunguardCli.as_str(),
        "level": Level::Error,
        "message": format!("log message ({message}) serialization failed: {err}"),
    })
    .to_string()
}

impl<W: Write + Send> LogSink for JsonLogger<W> {
    fn log_message(&mut self, message: &str, fields: &MessageFields) -> Result<()> {
        let timestamp = fields.timestamp.as_deref().unwrap_or_default();
        let record = LogRecord {
            timestamp,
            message_type: LOG_MESSAGE_TYPE,
            producer: fields.producer.map(Producer::as_str).unwrap_or_default(),
            producer_id: fields.producer_id.as_deref(),
            level: fields.level,
            message,
        };

        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "Falling back to error record for log message");
                error_record(&err, timestamp, &format!("{record:?}"))
            }
        };
        line.push('\n');
        self.output.write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}
