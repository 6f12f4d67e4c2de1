//! Step runner
//!
//! Spawns the step, feeds stdout and stderr through one [`StepOutputWriter`]
//! and enforces the overall and no-output timeouts.

use runguard_output::{OutputError, StepOutputWriter};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cli::{EXIT_FAILURE, EXIT_TIMEOUT};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Error types for step execution
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Step command is empty
    #[error("step command is empty")]
    EmptyCommand,

    /// Process spawn failed
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process failed
    #[error("failed waiting for '{program}': {source}")]
    Wait {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Step output could not be processed
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// What to run and how long to let it run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Kill the step after this long
    pub timeout: Option<Duration>,
    /// Kill the step after this long without output
    pub no_output_timeout: Option<Duration>,
    /// Working directory of the step
    pub working_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Run `command` without limits
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: None,
            no_output_timeout: None,
            working_dir: None,
        }
    }

    /// Set the overall timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the no-output timeout
    #[must_use]
    pub const fn with_no_output_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.no_output_timeout = timeout;
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// How the step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The step exited with a code
    Exited(i32),
    /// The step was killed by the overall timeout
    TimedOut(Duration),
    /// The step was killed for printing nothing
    NoOutput(Duration),
}

impl RunStatus {
    /// Exit code to report for this status
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::TimedOut(_) | Self::NoOutput(_) => EXIT_TIMEOUT,
        }
    }

    /// Whether the step succeeded
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            Self::NoOutput(limit) => {
                write!(f, "killed after {}s without output", limit.as_secs())
            }
        }
    }
}

/// Result of a finished step.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// How the step ended
    pub status: RunStatus,
    /// Red error blocks the step printed, already redacted
    pub error_messages: Vec<String>,
    /// Wall clock time
    pub duration: Duration,
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_FAILURE)
}

async fn forward<R>(mut reader: R, stream: &'static str, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(stream, error = %err, "Failed to read step output");
                break;
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run the step described by `config`, writing its output to `output`.
///
/// Both output streams are merged into `output` in arrival order. `output`
/// is closed before this returns.
///
/// # Errors
/// Returns an error if the step cannot be started or waited for, or if its
/// output cannot be processed.
#[tracing::instrument(name = "run_step", skip_all, fields(program = tracing::field::Empty))]
pub async fn run_step(
    config: &RunConfig,
    mut output: StepOutputWriter,
) -> Result<RunOutcome, RunnerError> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or(RunnerError::EmptyCommand)?;
    tracing::Span::current().record("program", program.as_str());

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
        program: program.clone(),
        source,
    })?;
    tracing::info!(pid = child.id(), "Started step");

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward(stdout, "stdout", tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward(stderr, "stderr", tx.clone()));
    }
    drop(tx);

    let deadline = config.timeout.map(|limit| started + limit);
    let mut last_output = started;
    let mut streams_open = true;
    let mut exited: Option<ExitStatus> = None;

    let status = loop {
        if let Some(status) = exited
            && !streams_open
        {
            break RunStatus::Exited(exit_code(status));
        }

        let hang_deadline = config.no_output_timeout.map(|limit| last_output + limit);
        tokio::select! {
            chunk = rx.recv(), if streams_open => match chunk {
                Some(bytes) => {
                    last_output = Instant::now();
                    output.write_output(&bytes)?;
                }
                None => streams_open = false,
            },
            status = child.wait(), if exited.is_none() => {
                let status = status.map_err(|source| RunnerError::Wait {
                    program: program.clone(),
                    source,
                })?;
                tracing::debug!(code = ?status.code(), "Step process exited");
                exited = Some(status);
            }
            () = wait_until(deadline) => {
                tracing::warn!("Step timed out");
                kill(&mut child).await;
                break RunStatus::TimedOut(config.timeout.unwrap_or_default());
            }
            () = wait_until(hang_deadline) => {
                tracing::warn!("Step produced no output in time");
                kill(&mut child).await;
                break RunStatus::NoOutput(config.no_output_timeout.unwrap_or_default());
            }
        }
    };

    output.close()?;
    let duration = started.elapsed();
    tracing::info!(
        status = %status,
        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        "Step finished"
    );

    Ok(RunOutcome {
        status,
        error_messages: output.error_messages(),
        duration,
    })
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "Failed to kill step process");
    }
}
