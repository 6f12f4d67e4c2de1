//! One-shot redaction of an in-memory string.

use std::io::Write;
use std::sync::Arc;

use crate::error::{FilterError, Result};
use crate::secrets::SecretSet;
use crate::writer::{FilterConfig, RedactingWriter};

/// Redact `value` as if it had been streamed through a [`RedactingWriter`]
/// and closed.
///
/// # Errors
/// Returns an error if the filter fails internally.
pub fn redact_string(value: &str, secrets: &Arc<SecretSet>) -> Result<String> {
    if secrets.is_empty() {
        return Ok(value.to_string());
    }

    let config = FilterConfig::default().with_flush_delay(None);
    let mut writer = RedactingWriter::with_config(Arc::clone(secrets), Vec::new(), config)?;
    writer.write_all(value.as_bytes())?;
    let out = writer.finish()?;

    String::from_utf8(out)
        .map_err(|e| FilterError::internal(format!("redacted output is not UTF-8: {e}")))
}
