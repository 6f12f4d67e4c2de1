//! Multi-line secret matching over a window of buffered lines.

use memchr::memmem;
use std::collections::{BTreeMap, BTreeSet};

use crate::secrets::SecretSet;

/// Full matches: secret index to the window line indexes where a complete
/// occurrence of that secret begins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    starts: BTreeMap<usize, Vec<usize>>,
}

impl MatchRecord {
    /// Record a full match of `secret` beginning on line `line`.
    pub fn insert(&mut self, secret: usize, line: usize) {
        self.starts.entry(secret).or_default().push(line);
    }

    /// Start lines of `secret`, ascending.
    #[must_use]
    pub fn starts(&self, secret: usize) -> &[usize] {
        self.starts.get(&secret).map_or(&[], Vec::as_slice)
    }

    /// Iterate over `(secret, start_line)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.starts
            .iter()
            .flat_map(|(secret, lines)| lines.iter().map(move |line| (*secret, *line)))
    }

    /// Whether no secret was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Window line indexes where a secret begins but the window ends before it
/// is confirmed or refuted.
pub type PartialMatchSet = BTreeSet<usize>;

/// Outcome of checking one candidate start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Full,
    Partial,
    Refuted,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || memmem::find(haystack, needle).is_some()
}

/// Walk the fragments of a secret forward from `start`.
fn confirm(fragments: &[Vec<u8>], lines: &[Vec<u8>], start: usize) -> Candidate {
    for (offset, fragment) in fragments.iter().enumerate().skip(1) {
        let Some(line) = lines.get(start + offset) else {
            return Candidate::Partial;
        };
        if !contains(line, fragment) {
            return Candidate::Refuted;
        }
    }
    Candidate::Full
}

/// Find every full and partial secret occurrence in `lines`.
///
/// A candidate starts on any line containing a secret's first fragment. For
/// multi-line secrets each following line must contain the next fragment;
/// running out of lines before the secret is exhausted makes the candidate a
/// partial match.
#[must_use]
pub fn match_secrets(secrets: &SecretSet, lines: &[Vec<u8>]) -> (MatchRecord, PartialMatchSet) {
    let mut matches = MatchRecord::default();
    let mut partials = PartialMatchSet::new();

    for (line_idx, line) in lines.iter().enumerate() {
        for secret_idx in secrets.first_fragment_hits(line) {
            let Some(secret) = secrets.get(secret_idx) else {
                continue;
            };
            match confirm(secret.fragments(), lines, line_idx) {
                Candidate::Full => matches.insert(secret_idx, line_idx),
                Candidate::Partial => {
                    partials.insert(line_idx);
                }
                Candidate::Refuted => {}
            }
        }
    }

    if !matches.is_empty() || !partials.is_empty() {
        tracing::trace!(
            window = lines.len(),
            full = matches.iter().count(),
            partial = partials.len(),
            "Matched secrets in window"
        );
    }

    (matches, partials)
}
