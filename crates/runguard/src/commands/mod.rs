//! Subcommand implementations.

pub mod redact;
pub mod redact_inputs;
pub mod run;

use crate::cli::{CliError, Commands};

/// Execute `command`, returning the process exit code.
///
/// # Errors
/// Returns an error if the command fails before it can report an exit code.
pub async fn execute(command: Commands) -> Result<i32, CliError> {
    match command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Redact(args) => redact::execute(&args),
        Commands::RedactInputs(args) => redact_inputs::execute(&args),
    }
}
