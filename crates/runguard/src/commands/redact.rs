//! `runguard redact`: filter stdin to stdout.

use runguard_redact::{FilterConfig, RedactingWriter};
use std::io::{self, Read};
use std::time::Duration;

use crate::cli::{CliError, EXIT_OK, RedactArgs};
use crate::secrets::load_secrets;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Copy `input` to `output`, redacting secrets on the way.
///
/// # Errors
/// Returns an error if reading, filtering or writing fails.
pub fn redact_stream<R, W>(
    mut input: R,
    output: W,
    args: &RedactArgs,
) -> Result<W, CliError>
where
    R: Read,
    W: io::Write + Send + 'static,
{
    let secrets = load_secrets(&args.secrets)?;
    let flush_delay = (args.flush_delay > 0).then(|| Duration::from_secs(args.flush_delay));
    let config = FilterConfig::default().with_flush_delay(flush_delay);
    let writer = RedactingWriter::with_config(secrets, output, config)?;

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        writer.write_bytes(&buf[..n])?;
    }
    Ok(writer.finish()?)
}

/// Run the command.
///
/// # Errors
/// Returns an error if secrets cannot be loaded or the stream fails.
pub fn execute(args: &RedactArgs) -> Result<i32, CliError> {
    redact_stream(io::stdin().lock(), io::stdout(), args)?;
    Ok(EXIT_OK)
}
