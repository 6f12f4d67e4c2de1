//! `runguard run`: execute a step behind the output chain.

use runguard_log::{Logger, LoggerOpts, Producer};
use runguard_output::StepOutputWriter;
use std::io;
use std::time::Duration;

use crate::cli::{CliError, RunArgs};
use crate::runner::{RunConfig, RunOutcome, run_step};
use crate::secrets::load_secrets;

fn logger_opts(args: &RunArgs, producer: Producer) -> LoggerOpts {
    let mut opts = LoggerOpts::default()
        .with_logger_type(args.format.into())
        .with_producer(producer)
        .with_console_timestamps(args.timestamps);
    if let Some(id) = &args.producer_id {
        opts = opts.with_producer_id(id.clone());
    }
    opts
}

/// Build the run configuration from the command line.
#[must_use]
pub fn run_config(args: &RunArgs) -> RunConfig {
    RunConfig::new(args.command.clone())
        .with_timeout(args.timeout.map(Duration::from_secs))
        .with_no_output_timeout(args.no_output_timeout.map(Duration::from_secs))
}

/// Report how the step ended through `logger`.
///
/// # Errors
/// Returns an error if the logger fails.
pub fn report(logger: &mut Logger, outcome: &RunOutcome) -> runguard_log::Result<()> {
    if outcome.status.success() {
        logger.done(format_args!(
            "Step succeeded in {:.2}s",
            outcome.duration.as_secs_f64()
        ))?;
        return logger.flush();
    }

    logger.error(format_args!("Step failed: {}", outcome.status))?;
    if let Some(message) = outcome.error_messages.last() {
        logger.error(format_args!("Last error: {message}"))?;
    }
    logger.flush()
}

/// Run the command.
///
/// # Errors
/// Returns an error if secrets cannot be loaded or the step cannot be run.
pub async fn execute(args: RunArgs) -> Result<i32, CliError> {
    let secrets = load_secrets(&args.secrets)?;
    let output = StepOutputWriter::new(secrets, logger_opts(&args, Producer::Step), io::stdout())
        .map_err(|err| CliError::runtime(err.to_string()))?;

    let outcome = run_step(&run_config(&args), output).await?;

    let mut logger = Logger::new(logger_opts(&args, Producer::RunguardCli), io::stdout());
    report(&mut logger, &outcome).map_err(|err| CliError::runtime(err.to_string()))?;
    Ok(outcome.status.exit_code())
}
