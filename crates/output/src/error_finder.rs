//! Extraction of red error blocks from step output.
//!
//! Steps report failures by printing red text. [`ErrorFinder`] passes output
//! through untouched while remembering every red block: the text between an
//! escape sequence carrying the `31` color code and the next escape that does
//! not. Red escapes inside a block do not end it and are stripped from the
//! collected message.

use parking_lot::Mutex;
use regex::bytes::Regex;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};

/// `ESC [ params m`. Group 1 is set when the params carry the red code.
static ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?-u)\x1b\[(?:[^m]*(31))?[^m]*m").ok());

/// Bytes kept between writes while outside a red block, enough to complete
/// a red escape split across writes.
pub const MAX_TAIL_LEN: usize = 20;

/// A complete `ESC [ ... m` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Escape {
    start: usize,
    end: usize,
    red: bool,
}

fn next_escape(haystack: &[u8], from: usize) -> Option<Escape> {
    let caps = ESCAPE.as_ref()?.captures_at(haystack, from)?;
    let whole = caps.get(0)?;
    Some(Escape {
        start: whole.start(),
        end: whole.end(),
        red: caps.get(1).is_some(),
    })
}

fn find_red(haystack: &[u8], mut from: usize) -> Option<Escape> {
    loop {
        let escape = next_escape(haystack, from)?;
        if escape.red {
            return Some(escape);
        }
        from = escape.end;
    }
}

/// First escape that ends a red block.
fn find_block_end(haystack: &[u8]) -> Option<Escape> {
    let mut from = 0;
    loop {
        let escape = next_escape(haystack, from)?;
        if !escape.red {
            return Some(escape);
        }
        from = escape.end;
    }
}

fn strip_red(bytes: &[u8]) -> String {
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while let Some(escape) = find_red(bytes, pos) {
        out.extend_from_slice(&bytes[pos..escape.start]);
        pos = escape.end;
    }
    out.extend_from_slice(&bytes[pos..]);
    String::from_utf8_lossy(&out).into_owned()
}

/// Error messages collected by an [`ErrorFinder`], shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct ErrorMessages(Arc<Mutex<Vec<String>>>);

impl ErrorMessages {
    /// Copy of the messages collected so far
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// The most recent message
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.0.lock().last().cloned()
    }

    /// Number of collected messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn push(&self, message: String) {
        self.0.lock().push(message);
    }
}

#[derive(Debug, Default)]
struct Scanner {
    chunk: Vec<u8>,
    collecting: bool,
}

impl Scanner {
    fn scan(&mut self, input: &[u8], messages: &ErrorMessages) {
        let mut haystack = std::mem::take(&mut self.chunk);
        haystack.extend_from_slice(input);

        let mut pos = 0;
        loop {
            let rest = &haystack[pos..];
            if self.collecting {
                let Some(end) = find_block_end(rest) else {
                    self.chunk = rest.to_vec();
                    return;
                };
                if end.start > 0 {
                    messages.push(strip_red(&rest[..end.start]));
                }
                self.collecting = false;
                pos += end.end;
            } else {
                let Some(red) = find_red(rest, 0) else {
                    let keep_from = rest.len().saturating_sub(MAX_TAIL_LEN);
                    self.chunk = rest[keep_from..].to_vec();
                    return;
                };
                self.collecting = true;
                pos += red.end;
            }
        }
    }

    fn drain(&mut self, messages: &ErrorMessages) {
        let chunk = std::mem::take(&mut self.chunk);
        if !std::mem::take(&mut self.collecting) {
            return;
        }
        let message = strip_red(&chunk);
        if !message.is_empty() {
            messages.push(message);
        }
    }
}

/// Pass-through writer that collects red error blocks.
///
/// A block still open when the output ends is only recorded by
/// [`ErrorFinder::close`].
#[derive(Debug)]
pub struct ErrorFinder<W> {
    inner: W,
    scanner: Scanner,
    messages: ErrorMessages,
}

impl<W: Write> ErrorFinder<W> {
    /// Forward output to `inner`
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scanner: Scanner::default(),
            messages: ErrorMessages::default(),
        }
    }

    /// Handle to the collected messages that outlives the writer
    #[must_use]
    pub fn messages(&self) -> ErrorMessages {
        self.messages.clone()
    }

    /// Messages collected so far
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.messages.snapshot()
    }

    /// Record an unterminated red block, if any.
    pub fn close(&mut self) {
        self.scanner.drain(&self.messages);
    }

    /// The wrapped writer
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Close and give back the wrapped writer
    pub fn into_inner(mut self) -> W {
        self.close();
        self.inner
    }
}

impl<W: Write> Write for ErrorFinder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.scanner.scan(&buf[..written], &self.messages);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
