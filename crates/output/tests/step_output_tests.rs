//! Console and JSON behavior of the full step output chain.

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use runguard_log::{LoggerOpts, LoggerType, Producer};
use runguard_output::StepOutputWriter;
use runguard_redact::{FilterConfig, SecretSet};
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const SIMPLE_LOG: &str = "failed to create file artifact: /bitrise/src/assets";

const ERROR_LOG: &str = "\u{1b}[31;1mfailed to create file artifact: /bitrise/src/assets:
  failed to get file size, error: file not exist at: /bitrise/src/assets\u{1b}[0m";

const ERROR_TEXT: &str = "failed to create file artifact: /bitrise/src/assets:
  failed to get file size, error: file not exist at: /bitrise/src/assets";

fn console_opts() -> LoggerOpts {
    LoggerOpts::default()
        .with_logger_type(LoggerType::Console)
        .with_time_provider(|| Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap())
}

fn json_opts() -> LoggerOpts {
    LoggerOpts::default()
        .with_logger_type(LoggerType::Json)
        .with_producer(Producer::Step)
        .with_producer_id("UUID")
        .with_time_provider(|| Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap())
}

fn run(secrets: &[&str], opts: LoggerOpts, messages: &[&str]) -> (String, Vec<String>) {
    let buf = SharedBuf::default();
    let secrets = Arc::new(SecretSet::new(secrets.iter().copied()).unwrap());
    let config = FilterConfig::default().with_flush_delay(None);
    let mut writer = StepOutputWriter::with_config(secrets, opts, buf.clone(), config).unwrap();
    for message in messages {
        let written = writer.write(message.as_bytes()).unwrap();
        assert_eq!(written, message.len());
    }
    writer.close().unwrap();
    (buf.text(), writer.error_messages())
}

fn json_record(level: &str, message: &str) -> String {
    format!(
        "{{\"timestamp\":\"0001-01-01T00:00:00Z\",\"type\":\"log\",\"producer\":\"step\",\"producer_id\":\"UUID\",\"level\":\"{level}\",\"message\":{}}}\n",
        serde_json::to_string(message).unwrap()
    )
}

#[test]
fn test_console_passes_simple_log_through() {
    let (out, errors) = run(&[], console_opts(), &[SIMPLE_LOG]);
    assert_eq!(out, SIMPLE_LOG);
    assert!(errors.is_empty());
}

#[test]
fn test_console_keeps_error_colors() {
    let (out, errors) = run(&[], console_opts(), &[ERROR_LOG]);
    assert_eq!(out, ERROR_LOG);
    assert_eq!(errors, [ERROR_TEXT]);
}

#[test]
fn test_json_simple_log() {
    let (out, _) = run(&[], json_opts(), &[SIMPLE_LOG]);
    assert_eq!(out, json_record("normal", SIMPLE_LOG));
}

#[test]
fn test_json_error_log_is_one_record() {
    let (out, errors) = run(&[], json_opts(), &[ERROR_LOG]);
    assert_eq!(out, json_record("error", ERROR_TEXT));
    assert_eq!(errors, [ERROR_TEXT]);
}

#[test]
fn test_json_with_secret_filtering() {
    let (out, _) = run(&["secret value"], json_opts(), &[SIMPLE_LOG]);
    assert_eq!(out, json_record("normal", SIMPLE_LOG));

    let (out, errors) = run(&["secret value"], json_opts(), &[ERROR_LOG]);
    assert_eq!(out, json_record("error", ERROR_TEXT));
    assert_eq!(errors, [ERROR_TEXT]);
}

#[test]
fn test_secret_hidden_in_output_and_errors() {
    let (out, errors) = run(
        &["s3cr3t\ntoken"],
        console_opts(),
        &["deploying\n\u{1b}[31;1mbad key: s3cr3t\n", "token rejected\u{1b}[0m\n"],
    );
    assert!(!out.contains("s3cr3t"));
    assert!(!out.contains("token"));
    assert_eq!(errors, ["bad key: [REDACTED]\n[REDACTED] rejected"]);
}

#[test]
fn test_red_escape_split_across_writes() {
    let (_, errors) = run(
        &[],
        console_opts(),
        &["Foo\u{1b}", "[31", ";1mBar\nBaz\nQux\u{1b}[0mTest\n"],
    );
    assert_eq!(errors, ["Bar\nBaz\nQux"]);
}
