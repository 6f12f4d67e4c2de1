//! Line accumulation.
//!
//! Incoming chunks are cut after every `\n`; whatever follows the last newline
//! is kept as the pending chunk and prepended to the next write.

/// Split `data` after each `\n`.
///
/// Returns the complete lines (newline included) and the trailing bytes that
/// are not terminated yet. The trailing part is empty when `data` ends with a
/// newline.
#[must_use]
pub fn split_after_newline(data: &[u8]) -> (Vec<Vec<u8>>, Vec<u8>) {
    let mut lines = Vec::new();
    let mut rest = data;

    while let Some(idx) = memchr::memchr(b'\n', rest) {
        let (line, tail) = rest.split_at(idx + 1);
        lines.push(line.to_vec());
        rest = tail;
    }

    (lines, rest.to_vec())
}

/// Buffers the bytes since the last line terminator.
#[derive(Debug, Default, Clone)]
pub struct LineAccumulator {
    pending: Vec<u8>,
}

impl LineAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        if memchr::memchr(b'\n', chunk).is_none() {
            self.pending.extend_from_slice(chunk);
            return Vec::new();
        }

        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(chunk);
        let (lines, pending) = split_after_newline(&data);
        self.pending = pending;
        lines
    }

    /// Bytes received but not terminated yet.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether a partial line is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the whole pending chunk.
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Take the first `len` pending bytes, keeping the rest buffered.
    pub fn take_pending_prefix(&mut self, len: usize) -> Vec<u8> {
        let len = len.min(self.pending.len());
        let rest = self.pending.split_off(len);
        std::mem::replace(&mut self.pending, rest)
    }
}
