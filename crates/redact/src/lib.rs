//! Streaming secret redaction for step output.
//!
//! Output of a step is arbitrary chunked text. [`RedactingWriter`] sits in
//! front of the real sink and replaces every configured secret with
//! [`REDACTED_PLACEHOLDER`], including secrets that span several lines and
//! secrets whose bytes arrive over many writes.
//!
//! # Pipeline
//!
//! ```text
//! write(bytes) ─▶ LineAccumulator ─▶ window = retained + line
//!                                      │
//!                                      ▼
//!                                match_secrets ─▶ lines_to_keep_from
//!                                      │                 │
//!                                      ▼                 ▼
//!                                 redact emit prefix   retain tail
//!                                      │
//!                                      ▼
//!                                   target
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::io::Write;
//! use std::sync::Arc;
//! use runguard_redact::{RedactingWriter, SecretSet};
//!
//! let secrets = Arc::new(SecretSet::new(["hunter2"])?);
//! let mut writer = RedactingWriter::new(secrets, std::io::stdout())?;
//! writer.write_all(b"password: hunter2\n")?;
//! writer.close()?;
//! ```

pub mod batch;
pub mod error;
pub mod filter;
pub mod inputs;
pub mod lines;
pub mod matching;
pub mod redaction;
pub mod retention;
pub mod secrets;
pub mod writer;

pub use batch::redact_string;
pub use error::{FilterError, Result};
pub use filter::{DEFAULT_MAX_PENDING_BYTES, LineFilter};
pub use inputs::{InputOptions, InputRedactor};
pub use matching::{MatchRecord, PartialMatchSet, match_secrets};
pub use redaction::{MatchRange, REDACTED_PLACEHOLDER};
pub use secrets::{Secret, SecretSet};
pub use writer::{DEFAULT_FLUSH_DELAY, FilterConfig, RedactingWriter};
