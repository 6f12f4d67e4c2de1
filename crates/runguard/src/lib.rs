//! runguard - run CI steps without leaking their secrets
//!
//! The binary wraps a step command: its stdout and stderr pass through a
//! [`runguard_output::StepOutputWriter`], which redacts secrets, remembers
//! red error blocks and logs the output as console text or JSON lines.
//! Overall and no-output timeouts stop steps that run away or hang.
//!
//! Two helper commands expose the redaction filter directly: `redact` for
//! arbitrary streams and `redact-inputs` for step inputs.

// CLI output goes to stdout/stderr by design
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing and exit codes.
pub mod cli;
/// Command implementations.
pub mod commands;
/// Step execution with timeouts.
pub mod runner;
/// Secret loading.
pub mod secrets;
/// Diagnostic tracing setup.
pub mod tracing;

pub use cli::{CliError, EXIT_CLI, EXIT_FAILURE, EXIT_OK, EXIT_TIMEOUT};
pub use runner::{RunConfig, RunOutcome, RunStatus, RunnerError, run_step};
