//! `runguard redact-inputs`: redact a JSON list of step inputs.

use runguard_redact::InputRedactor;
use serde_json::{Map, Value};
use std::io::{self, Read};
use std::path::Path;

use crate::cli::{CliError, EXIT_OK, RedactInputsArgs};
use crate::secrets::load_secrets;

fn read_inputs(path: &Path) -> Result<Vec<Value>, CliError> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path).map_err(|err| {
            CliError::config(format!("failed to read inputs {}: {err}", path.display()))
        })?
    };
    serde_json::from_str(&content).map_err(|err| {
        CliError::config_with_help(
            format!("invalid inputs {}: {err}", path.display()),
            "Inputs must be a JSON array of objects like {\"NAME\": \"value\"}",
        )
    })
}

/// Redact the inputs described by `args`.
///
/// # Errors
/// Returns an error if secrets or inputs cannot be loaded, or an input is
/// malformed.
pub fn redact_inputs(args: &RedactInputsArgs) -> Result<Map<String, Value>, CliError> {
    let secrets = load_secrets(&args.secrets)?;
    let inputs = read_inputs(&args.file)?;
    let redactor = InputRedactor::new(secrets).with_environment(std::env::vars().collect());
    redactor
        .redact(&inputs)
        .map_err(|err| CliError::config(err.to_string()))
}

/// Run the command.
///
/// # Errors
/// Same as [`redact_inputs`].
pub fn execute(args: &RedactInputsArgs) -> Result<i32, CliError> {
    let redacted = redact_inputs(args)?;
    let json = serde_json::to_string_pretty(&redacted)
        .map_err(|err| CliError::runtime(format!("failed to encode inputs: {err}")))?;
    println!("{json}");
    Ok(EXIT_OK)
}
