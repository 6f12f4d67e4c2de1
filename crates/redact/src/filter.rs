//! The line-buffered redaction state machine.
//!
//! [`LineFilter`] owns everything a stream needs between writes: the pending
//! chunk, the retained lines and the fragments carried with them. It does no
//! I/O; callers feed it bytes and write out whatever it returns.

use std::sync::Arc;

use crate::error::Result;
use crate::lines::LineAccumulator;
use crate::matching::match_secrets;
use crate::redaction::{redact_fragments, secret_fragments_for_line};
use crate::retention::{carried_fragments, lines_to_keep_from, pending_release_len, split_window};
use crate::secrets::SecretSet;

/// Default upper bound for the unterminated pending chunk (1 MiB).
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Streaming redaction over complete lines.
#[derive(Debug)]
pub struct LineFilter {
    secrets: Arc<SecretSet>,
    accumulator: LineAccumulator,
    retained: Vec<Vec<u8>>,
    /// Parallel to `retained`.
    carried: Vec<Vec<Vec<u8>>>,
    max_pending_bytes: usize,
}

impl LineFilter {
    /// Create a filter for `secrets`.
    #[must_use]
    pub fn new(secrets: Arc<SecretSet>) -> Self {
        Self {
            secrets,
            accumulator: LineAccumulator::new(),
            retained: Vec::new(),
            carried: Vec::new(),
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }

    /// Force-split the pending chunk once it grows past `max` bytes.
    #[must_use]
    pub const fn with_max_pending_bytes(mut self, max: usize) -> Self {
        self.max_pending_bytes = max;
        self
    }

    /// The secrets this filter censors.
    #[must_use]
    pub fn secrets(&self) -> &SecretSet {
        &self.secrets
    }

    /// Whether an unterminated chunk is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.accumulator.has_pending()
    }

    /// Number of complete lines held back.
    #[must_use]
    pub fn retained_lines(&self) -> usize {
        self.retained.len()
    }

    /// Feed `chunk` and return the bytes that are safe to emit now.
    ///
    /// # Errors
    /// Returns [`crate::FilterError::Internal`] if redaction failed. Nothing
    /// from this call may be written out in that case.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for line in self.accumulator.push(chunk) {
            self.process_line(line, &mut out)?;
        }

        if self.accumulator.pending().len() > self.max_pending_bytes {
            tracing::debug!(
                pending = self.accumulator.pending().len(),
                limit = self.max_pending_bytes,
                "Pending chunk over budget, splitting"
            );
            self.split_pending(&mut out)?;
        }

        Ok(out)
    }

    /// Push the pending chunk through the pipeline as if it were a line.
    ///
    /// The longest suffix that could still grow into a secret stays pending,
    /// and so does any secret occurrence the cut would otherwise split.
    ///
    /// # Errors
    /// Same as [`LineFilter::push`].
    pub fn force_pending(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.split_pending(&mut out)?;
        Ok(out)
    }

    /// Resolve everything buffered, ignoring partial matches.
    ///
    /// # Errors
    /// Same as [`LineFilter::push`].
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.accumulator.has_pending() {
            let last = self.accumulator.take_pending();
            self.process_line(last, &mut out)?;
        }

        let mut window = std::mem::take(&mut self.retained);
        let mut carried = std::mem::take(&mut self.carried);
        if window.is_empty() {
            return Ok(out);
        }
        // Output ending on a newline ends with an empty line, which completes
        // secrets that end with a newline.
        if window.last().is_some_and(|line| line.ends_with(b"\n")) {
            window.push(Vec::new());
            carried.push(Vec::new());
        }

        let (matches, _) = match_secrets(&self.secrets, &window);
        for (idx, (line, carry)) in window.iter().zip(&carried).enumerate() {
            let fragments = secret_fragments_for_line(&self.secrets, idx, &matches)
                .into_iter()
                .chain(carry.iter().map(Vec::as_slice));
            out.extend(redact_fragments(line, fragments)?);
        }
        Ok(out)
    }

    fn split_pending(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let pending = self.accumulator.pending();
        let release = pending_release_len(&self.secrets, pending);
        let hold = pending.len() - release;
        if release == 0 {
            tracing::trace!(hold, "Pending chunk cannot be split yet");
            return Ok(());
        }

        tracing::trace!(release, hold, "Releasing pending chunk");
        let chunk = self.accumulator.take_pending_prefix(release);
        self.process_line(chunk, out)
    }

    fn process_line(&mut self, line: Vec<u8>, out: &mut Vec<u8>) -> Result<()> {
        if self.secrets.is_empty() {
            out.extend(line);
            return Ok(());
        }

        let mut window = std::mem::take(&mut self.retained);
        let mut carried = std::mem::take(&mut self.carried);
        window.push(line);
        carried.push(Vec::new());

        let (matches, partials) = match_secrets(&self.secrets, &window);
        let keep_from = lines_to_keep_from(&partials);

        if let Some(first) = keep_from {
            let mut carry = carried_fragments(&self.secrets, &matches, first, window.len());
            for (next, previous) in carry.iter_mut().zip(carried.iter().skip(first)) {
                next.extend(previous.iter().cloned());
                next.sort_unstable();
                next.dedup();
            }
            carried.truncate(first);
            self.carried = carry;
        }

        let window_len = window.len();
        let (emit, keep) = split_window(window, keep_from);
        for (idx, line) in emit.iter().enumerate() {
            let fragments = secret_fragments_for_line(&self.secrets, idx, &matches)
                .into_iter()
                .chain(carried.get(idx).into_iter().flatten().map(Vec::as_slice));
            out.extend(redact_fragments(line, fragments)?);
        }

        if !keep.is_empty() {
            tracing::trace!(
                window = window_len,
                retained = keep.len(),
                "Holding back lines for unresolved secret"
            );
        }
        self.retained = keep;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(secrets: &[&str]) -> LineFilter {
        LineFilter::new(Arc::new(SecretSet::new(secrets).unwrap()))
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_no_secrets_passes_lines_through() {
        let mut f = filter(&[]);
        assert_eq!(text(f.push(b"hello\nwor").unwrap()), "hello\n");
        assert_eq!(text(f.finish().unwrap()), "wor");
    }

    #[test]
    fn test_single_line_secret_emitted_immediately() {
        let mut f = filter(&["abc"]);
        assert_eq!(
            text(f.push(b"prefix abc suffix\n").unwrap()),
            "prefix [REDACTED] suffix\n"
        );
        assert_eq!(f.retained_lines(), 0);
    }

    #[test]
    fn test_partial_match_is_held_until_resolved() {
        let mut f = filter(&["a\nb\nc"]);
        assert_eq!(text(f.push(b"x\na\n").unwrap()), "x\n");
        assert_eq!(f.retained_lines(), 1);
        assert_eq!(text(f.push(b"b\n").unwrap()), "");
        assert_eq!(f.retained_lines(), 2);
        assert_eq!(
            text(f.push(b"c\n").unwrap()),
            "[REDACTED]\n[REDACTED]\n[REDACTED]\n"
        );
        assert_eq!(f.retained_lines(), 0);
    }

    #[test]
    fn test_refuted_candidate_releases_lines() {
        let mut f = filter(&["a\nb\nc"]);
        assert_eq!(text(f.push(b"a\n").unwrap()), "");
        assert_eq!(text(f.push(b"z\n").unwrap()), "a\nz\n");
    }

    #[test]
    fn test_finish_ignores_partials() {
        let mut f = filter(&["a\nb\nc"]);
        assert_eq!(text(f.push(b"a\nb\n").unwrap()), "");
        assert_eq!(text(f.finish().unwrap()), "a\nb\n");
    }

    #[test]
    fn test_finish_redacts_last_unterminated_line() {
        let mut f = filter(&["a\nb\nc"]);
        assert_eq!(text(f.push(b"x\na\nb\nc").unwrap()), "x\n");
        assert_eq!(
            text(f.finish().unwrap()),
            "[REDACTED]\n[REDACTED]\n[REDACTED]"
        );
    }

    #[test]
    fn test_trailing_newline_secret_at_end_of_output() {
        let mut f = filter(&["token\n"]);
        assert_eq!(text(f.push(b"my token\n").unwrap()), "");
        assert_eq!(text(f.finish().unwrap()), "my [REDACTED]\n");
    }

    #[test]
    fn test_crossing_match_redacted_after_release() {
        let mut f = filter(&["p\nq\nr", "r\nz"]);
        let first = text(f.push(b"p\nq\nr\n").unwrap());
        assert_eq!(first, "[REDACTED]\n[REDACTED]\n");
        assert_eq!(f.retained_lines(), 1);
        // "r\nz" is refuted, but "r" still belongs to "p\nq\nr".
        assert_eq!(text(f.push(b"y\n").unwrap()), "[REDACTED]\ny\n");
    }

    #[test]
    fn test_repeating_secret_lines_stay_bounded() {
        let mut f = filter(&["r\nr"]);
        for _ in 0..100 {
            f.push(b"r\n").unwrap();
            assert!(f.retained_lines() <= 1);
        }
        // The last line completes a match with the one before it.
        assert_eq!(text(f.finish().unwrap()), "[REDACTED]\n");
    }

    #[test]
    fn test_force_pending_holds_back_secret_prefix() {
        let mut f = filter(&["abcdef"]);
        assert_eq!(text(f.push(b"token: abc").unwrap()), "");
        assert_eq!(text(f.force_pending().unwrap()), "token: ");
        assert!(f.has_pending());
        assert_eq!(text(f.push(b"def\n").unwrap()), "[REDACTED]\n");
    }

    #[test]
    fn test_force_pending_without_risky_suffix() {
        let mut f = filter(&["abcdef"]);
        f.push(b"progress 42%").unwrap();
        assert_eq!(text(f.force_pending().unwrap()), "progress 42%");
        assert!(!f.has_pending());
    }

    #[test]
    fn test_force_pending_keeps_complete_secret_whole() {
        let mut f = filter(&["s3cr3ts"]);
        assert_eq!(text(f.push(b"token s3cr3ts").unwrap()), "");
        assert_eq!(text(f.force_pending().unwrap()), "token ");
        assert_eq!(text(f.push(b"\n").unwrap()), "[REDACTED]\n");
    }

    #[test]
    fn test_pending_budget_keeps_complete_secret_whole() {
        let mut f = filter(&["s3cr3ts"]).with_max_pending_bytes(8);
        assert_eq!(text(f.push(b"token s3cr3ts").unwrap()), "token ");
        assert_eq!(text(f.push(b" tail\n").unwrap()), "[REDACTED] tail\n");
    }

    #[test]
    fn test_overlapping_occurrences_are_not_split() {
        let mut f = filter(&["aa", "aba"]).with_max_pending_bytes(0);
        assert_eq!(text(f.push(b"aa").unwrap()), "");
        assert_eq!(text(f.force_pending().unwrap()), "");
        assert_eq!(text(f.finish().unwrap()), "[REDACTED]");
    }

    #[test]
    fn test_pending_budget_forces_split() {
        let mut f = filter(&["secret"]).with_max_pending_bytes(8);
        assert_eq!(text(f.push(b"0123456789").unwrap()), "0123456789");
        assert_eq!(text(f.push(b"abcdefghsec").unwrap()), "abcdefgh");
        assert_eq!(text(f.push(b"ret\n").unwrap()), "[REDACTED]\n");
    }
}
