//! `io::Write` front end with the flush timer.

use parking_lot::{Condvar, Mutex};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{FilterError, Result};
use crate::filter::{DEFAULT_MAX_PENDING_BYTES, LineFilter};
use crate::secrets::SecretSet;

/// Default delay before an unterminated chunk is forced out.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(10);

/// Tuning for a [`RedactingWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// How long an unterminated chunk may wait for its newline. `None`
    /// disables the timer; the chunk then waits for the next write or close.
    ///
    /// A timed flush fires once per idle period. Bytes that could still be
    /// part of a secret stay behind after it: at most the longest fragment
    /// minus one byte, plus any complete secret occurrence the cut would have
    /// split. They leave with the next write or on close.
    pub flush_delay: Option<Duration>,
    /// Upper bound for the unterminated chunk before it is split.
    pub max_pending_bytes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            flush_delay: Some(DEFAULT_FLUSH_DELAY),
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

impl FilterConfig {
    /// Set the flush delay
    #[must_use]
    pub const fn with_flush_delay(mut self, delay: Option<Duration>) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Set the pending chunk budget
    #[must_use]
    pub const fn with_max_pending_bytes(mut self, max: usize) -> Self {
        self.max_pending_bytes = max;
        self
    }
}

struct State<W> {
    filter: LineFilter,
    target: Option<W>,
    deadline: Option<Instant>,
    /// Error raised by a timed flush, reported on the next call.
    deferred: Option<FilterError>,
    poisoned: bool,
    closed: bool,
    shutdown: bool,
}

impl<W: Write> State<W> {
    fn ensure_usable(&mut self) -> Result<()> {
        if self.closed {
            return Err(FilterError::Closed);
        }
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.poisoned {
            return Err(FilterError::Poisoned);
        }
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let target = self.target.as_mut().ok_or(FilterError::Closed)?;
        target.write_all(bytes)?;
        Ok(())
    }

    /// Run `step` and write its output; any failure stops the filter.
    fn run<F>(&mut self, step: F) -> Result<()>
    where
        F: FnOnce(&mut LineFilter) -> Result<Vec<u8>>,
    {
        let result = step(&mut self.filter).and_then(|out| self.emit(&out));
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn flush_expired(&mut self) {
        self.deadline = None;
        if self.closed || self.poisoned {
            return;
        }

        let result = self
            .run(LineFilter::force_pending)
            .and_then(|()| match self.target.as_mut() {
                Some(target) => target.flush().map_err(FilterError::from),
                None => Ok(()),
            });

        if let Err(err) = result {
            tracing::error!(error = %err, "Timed flush of pending output failed");
            self.poisoned = true;
            self.deferred = Some(err);
        }
    }
}

struct Shared<W> {
    state: Mutex<State<W>>,
    wake: Condvar,
}

fn run_timer<W: Write>(shared: &Shared<W>) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => state.flush_expired(),
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
}

/// A writer that censors secrets before they reach `W`.
///
/// Complete lines are matched and emitted as soon as no multi-line secret
/// can still start in them. Bytes after the last newline wait for the rest
/// of their line, for [`FilterConfig::flush_delay`], or for
/// [`RedactingWriter::close`].
///
/// `write` always reports the full input as consumed. `flush` only flushes
/// the target; use [`RedactingWriter::close`] or [`RedactingWriter::finish`]
/// to release buffered output. Dropping an open writer closes it.
pub struct RedactingWriter<W: Write + Send + 'static> {
    shared: Arc<Shared<W>>,
    timer: Option<JoinHandle<()>>,
    flush_delay: Option<Duration>,
}

impl<W: Write + Send + 'static> RedactingWriter<W> {
    /// Wrap `target` with the default configuration.
    ///
    /// # Errors
    /// Returns an error if the flush timer thread cannot be started.
    pub fn new(secrets: Arc<SecretSet>, target: W) -> Result<Self> {
        Self::with_config(secrets, target, FilterConfig::default())
    }

    /// Wrap `target` with `config`.
    ///
    /// # Errors
    /// Returns an error if the flush timer thread cannot be started.
    pub fn with_config(secrets: Arc<SecretSet>, target: W, config: FilterConfig) -> Result<Self> {
        let filter = LineFilter::new(secrets).with_max_pending_bytes(config.max_pending_bytes);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                filter,
                target: Some(target),
                deadline: None,
                deferred: None,
                poisoned: false,
                closed: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let timer = match config.flush_delay {
            Some(_) => {
                let shared = Arc::clone(&shared);
                let handle = std::thread::Builder::new()
                    .name("redact-flush".to_string())
                    .spawn(move || run_timer(&shared))?;
                Some(handle)
            }
            None => None,
        };

        Ok(Self {
            shared,
            timer,
            flush_delay: config.flush_delay,
        })
    }

    /// Feed `buf` through the filter.
    ///
    /// # Errors
    /// Returns [`FilterError::Closed`] after close, the target's error if a
    /// write failed, or an error left behind by a timed flush.
    pub fn write_bytes(&self, buf: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_usable()?;
        state.run(|filter| filter.push(buf))?;

        if state.filter.has_pending() {
            if state.deadline.is_none()
                && let Some(delay) = self.flush_delay
            {
                state.deadline = Some(Instant::now() + delay);
                self.shared.wake.notify_one();
            }
        } else {
            state.deadline = None;
        }
        Ok(())
    }

    /// Emit everything still buffered and flush the target.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns the first error of the final drain, or an error left behind by
    /// a timed flush.
    pub fn close(&mut self) -> Result<()> {
        let result = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            let usable = state.ensure_usable();
            state.closed = true;
            state.deadline = None;
            usable.and_then(|()| {
                state.run(LineFilter::finish)?;
                match state.target.as_mut() {
                    Some(target) => target.flush().map_err(FilterError::from),
                    None => Ok(()),
                }
            })
        };
        self.stop_timer();
        tracing::debug!(ok = result.is_ok(), "Closed redacting writer");
        result
    }

    /// Close the writer and hand back the target.
    ///
    /// # Errors
    /// Same as [`RedactingWriter::close`].
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.shared
            .state
            .lock()
            .target
            .take()
            .ok_or(FilterError::Closed)
    }

    fn stop_timer(&mut self) {
        let Some(handle) = self.timer.take() else {
            return;
        };
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            tracing::error!("Flush timer thread panicked");
        }
    }
}

impl<W: Write + Send + 'static> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        match state.target.as_mut() {
            Some(target) => target.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send + 'static> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close redacting writer on drop");
        }
    }
}

impl<W: Write + Send + 'static> std::fmt::Debug for RedactingWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactingWriter")
            .field("flush_delay", &self.flush_delay)
            .field("timer", &self.timer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Target whose contents stay observable while the writer owns it.
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

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "sink gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn secrets(values: &[&str]) -> Arc<SecretSet> {
        Arc::new(SecretSet::new(values).unwrap())
    }

    fn no_timer() -> FilterConfig {
        FilterConfig::default().with_flush_delay(None)
    }

    #[test]
    fn test_write_reports_full_length() {
        let mut writer =
            RedactingWriter::with_config(secrets(&["abc"]), Vec::new(), no_timer()).unwrap();
        assert_eq!(writer.write(b"x abc").unwrap(), 5);
        assert_eq!(writer.write(b"\n").unwrap(), 1);
        assert_eq!(writer.finish().unwrap(), b"x [REDACTED]\n");
    }

    #[test]
    fn test_flush_is_not_terminal() {
        let sink = SharedBuf::default();
        let mut writer =
            RedactingWriter::with_config(secrets(&["abcdef"]), sink.clone(), no_timer()).unwrap();
        writer.write_all(b"key: abc").unwrap();
        writer.flush().unwrap();
        assert_eq!(sink.text(), "");
        writer.write_all(b"def\n").unwrap();
        writer.close().unwrap();
        assert_eq!(sink.text(), "key: [REDACTED]\n");
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut writer =
            RedactingWriter::with_config(secrets(&["abc"]), Vec::new(), no_timer()).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        let err = writer.write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_target_error_passes_through_and_poisons() {
        let mut writer =
            RedactingWriter::with_config(secrets(&["abc"]), FailingSink, no_timer()).unwrap();
        let err = writer.write(b"line\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        let err = writer.write_bytes(b"more\n").unwrap_err();
        assert!(matches!(err, FilterError::Poisoned));
    }

    #[test]
    fn test_drop_closes() {
        let sink = SharedBuf::default();
        {
            let mut writer =
                RedactingWriter::with_config(secrets(&["abc"]), sink.clone(), no_timer())
                    .unwrap();
            writer.write_all(b"tail abc").unwrap();
        }
        assert_eq!(sink.text(), "tail [REDACTED]");
    }

    #[test]
    fn test_timer_forces_pending_chunk() {
        let sink = SharedBuf::default();
        let config = FilterConfig::default().with_flush_delay(Some(Duration::from_millis(20)));
        let mut writer =
            RedactingWriter::with_config(secrets(&["abcdef"]), sink.clone(), config).unwrap();

        writer.write_all(b"progress 10% abc").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.text().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        // The possible secret prefix stays behind.
        assert_eq!(sink.text(), "progress 10% ");

        writer.write_all(b"def done\n").unwrap();
        writer.close().unwrap();
        assert_eq!(sink.text(), "progress 10% [REDACTED] done\n");
    }

    #[test]
    fn test_timer_keeps_complete_secret_whole() {
        let sink = SharedBuf::default();
        let config = FilterConfig::default().with_flush_delay(Some(Duration::from_millis(20)));
        let mut writer =
            RedactingWriter::with_config(secrets(&["s3cr3ts"]), sink.clone(), config).unwrap();

        writer.write_all(b"token s3cr3ts").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.text().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.text(), "token ");

        writer.write_all(b"\n").unwrap();
        writer.close().unwrap();
        assert_eq!(sink.text(), "token [REDACTED]\n");
    }

    #[test]
    fn test_held_suffix_waits_for_close() {
        let sink = SharedBuf::default();
        let config = FilterConfig::default().with_flush_delay(Some(Duration::from_millis(10)));
        let mut writer =
            RedactingWriter::with_config(secrets(&["abcdef"]), sink.clone(), config).unwrap();

        writer.write_all(b"eta abc").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.text().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        // The timer does not fire again for the held bytes.
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(sink.text(), "eta ");

        writer.close().unwrap();
        assert_eq!(sink.text(), "eta abc");
    }

    #[test]
    fn test_config_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.flush_delay, Some(Duration::from_secs(10)));
        assert_eq!(config.max_pending_bytes, 1024 * 1024);
        let config = config.with_max_pending_bytes(64);
        assert_eq!(config.max_pending_bytes, 64);
    }
}
