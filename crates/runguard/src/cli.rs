use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use runguard_log::LoggerType;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

use crate::runner::RunnerError;
use crate::secrets::SecretsError;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Runtime failure exit code
pub const EXIT_FAILURE: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// The step exceeded its timeout or stopped producing output
pub const EXIT_TIMEOUT: i32 = 124;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(runguard::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Failure while running or filtering (exit code 1)
    #[error("Runtime error: {message}")]
    #[diagnostic(code(runguard::cli::runtime))]
    Runtime {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new runtime error
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            help: None,
        }
    }
}

impl From<SecretsError> for CliError {
    fn from(err: SecretsError) -> Self {
        match err {
            SecretsError::Read { .. } | SecretsError::Parse { .. } => Self::config_with_help(
                err.to_string(),
                "The secrets file must hold a JSON array of strings",
            ),
            SecretsError::Filter(_) => Self::runtime(err.to_string()),
        }
    }
}

impl From<RunnerError> for CliError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::EmptyCommand => {
                Self::config_with_help(err.to_string(), "Pass the step command after `--`")
            }
            RunnerError::Spawn { .. } => Self::config_with_help(
                err.to_string(),
                "Check that the command exists and is executable",
            ),
            RunnerError::Wait { .. } | RunnerError::Output(_) => Self::runtime(err.to_string()),
        }
    }
}

impl From<runguard_redact::FilterError> for CliError {
    fn from(err: runguard_redact::FilterError) -> Self {
        Self::runtime(err.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::runtime(err.to_string())
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Runtime { .. } => EXIT_FAILURE,
    }
}

/// Render an error for humans on stderr
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}

/// Format of step output
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Colored console output
    #[default]
    Console,
    /// One JSON record per message
    Json,
}

impl From<OutputFormat> for LoggerType {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Console => Self::Console,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// Run CI steps without leaking their secrets.
#[derive(Parser, Debug)]
#[command(name = "runguard")]
#[command(about = "Run CI steps with secret redaction, error extraction and timeouts")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    /// Format of diagnostic logs on stderr.
    #[arg(
        long,
        global = true,
        help = "Format of diagnostic logs on stderr",
        default_value = "compact",
        value_enum
    )]
    pub trace_format: crate::tracing::TracingFormat,
}

/// Where secrets come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SecretArgs {
    /// Environment variables whose values are secrets.
    #[arg(
        long = "secret-env",
        value_name = "NAME",
        env = "RUNGUARD_SECRET_ENVS",
        value_delimiter = ',',
        help = "Environment variable holding a secret (repeatable)"
    )]
    pub secret_envs: Vec<String>,

    /// JSON file holding an array of secret values.
    #[arg(
        long,
        value_name = "PATH",
        env = "RUNGUARD_SECRETS_FILE",
        help = "JSON file with an array of secret values"
    )]
    pub secrets_file: Option<PathBuf>,
}

/// Arguments of `runguard run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Secret sources.
    #[command(flatten)]
    pub secrets: SecretArgs,

    /// Overall time limit in seconds.
    #[arg(long, value_name = "SECS", help = "Kill the step after this many seconds")]
    pub timeout: Option<u64>,

    /// Time limit without any output, in seconds.
    #[arg(
        long,
        value_name = "SECS",
        help = "Kill the step when it prints nothing for this many seconds"
    )]
    pub no_output_timeout: Option<u64>,

    /// Step output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Console, help = "Step output format")]
    pub format: OutputFormat,

    /// Identifier recorded with JSON output.
    #[arg(long, value_name = "ID", help = "Step identifier for JSON output")]
    pub producer_id: Option<String>,

    /// Prefix console output with timestamps.
    #[arg(long, help = "Prefix console output with timestamps")]
    pub timestamps: bool,

    /// Command and arguments.
    #[arg(last = true, required = true, value_name = "CMD")]
    pub command: Vec<String>,
}

/// Arguments of `runguard redact`.
#[derive(Args, Debug, Clone)]
pub struct RedactArgs {
    /// Secret sources.
    #[command(flatten)]
    pub secrets: SecretArgs,

    /// Seconds an incomplete line may wait before it is flushed.
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 10,
        help = "Flush an unterminated line after this many seconds (0 disables)"
    )]
    pub flush_delay: u64,
}

/// Arguments of `runguard redact-inputs`.
#[derive(Args, Debug, Clone)]
pub struct RedactInputsArgs {
    /// Secret sources.
    #[command(flatten)]
    pub secrets: SecretArgs,

    /// JSON array of step inputs; `-` reads stdin.
    #[arg(long, value_name = "PATH", help = "JSON array of step inputs (- for stdin)")]
    pub file: PathBuf,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a step, redacting and logging its output.
    #[command(about = "Run a step, redacting and logging its output")]
    Run(RunArgs),
    /// Redact stdin to stdout.
    #[command(about = "Redact secrets from stdin to stdout")]
    Redact(RedactArgs),
    /// Redact a list of step inputs.
    #[command(about = "Redact secrets from step inputs")]
    RedactInputs(RedactInputsArgs),
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&CliError::config("bad")), EXIT_CLI);
        assert_eq!(exit_code_for(&CliError::runtime("boom")), EXIT_FAILURE);
        assert_eq!(EXIT_OK, 0);
        assert_eq!(EXIT_TIMEOUT, 124);
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "runguard",
            "run",
            "--secret-env",
            "TOKEN",
            "--secret-env",
            "PASSWORD",
            "--timeout",
            "30",
            "--format",
            "json",
            "--",
            "sh",
            "-c",
            "echo hi",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.secrets.secret_envs, ["TOKEN", "PASSWORD"]);
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.command, ["sh", "-c", "echo hi"]);
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Cli::try_parse_from(["runguard", "run"]).is_err());
    }

    #[test]
    fn test_parse_redact_defaults() {
        let cli = Cli::try_parse_from(["runguard", "redact", "--secret-env", "A,B"]).unwrap();
        let Commands::Redact(args) = cli.command else {
            panic!("expected redact");
        };
        assert_eq!(args.secrets.secret_envs, ["A", "B"]);
        assert_eq!(args.flush_delay, 10);
    }

    #[test]
    fn test_runner_errors_map_to_exit_codes() {
        assert_eq!(exit_code_for(&RunnerError::EmptyCommand.into()), EXIT_CLI);
        let spawn = RunnerError::Spawn {
            program: "missing".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(exit_code_for(&spawn.into()), EXIT_CLI);
    }
}
