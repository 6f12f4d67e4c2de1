//! Secret preprocessing.
//!
//! Every configured secret is split on `\n` into ordered fragments. A fragment
//! holds one line of the secret without the newline itself, so adjacent
//! fragments must be found on consecutive lines of output.

use aho_corasick::AhoCorasick;
use std::collections::HashSet;

use crate::error::FilterError;

/// A configured secret, split into per-line fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    fragments: Vec<Vec<u8>>,
}

impl Secret {
    /// Split a secret value on `\n`.
    ///
    /// Returns `None` when the value carries no bytes to redact (empty, or
    /// only newlines).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let fragments: Vec<Vec<u8>> = value
            .as_bytes()
            .split(|b| *b == b'\n')
            .map(<[u8]>::to_vec)
            .collect();

        if fragments.iter().all(Vec::is_empty) {
            return None;
        }

        Some(Self { fragments })
    }

    /// Fragments in line order.
    #[must_use]
    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    /// The fragment every match has to begin with.
    #[must_use]
    pub fn first_fragment(&self) -> &[u8] {
        &self.fragments[0]
    }

    /// Number of output lines a full match spans.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the secret spans more than one line.
    #[must_use]
    pub fn is_multiline(&self) -> bool {
        self.fragments.len() > 1
    }
}

/// The immutable set of secrets a filter instance censors.
///
/// Besides the configured values it holds, for every multi-line secret, a
/// single-line variant where each newline is written as the two characters
/// `\` and `n`, so values that were escaped before being printed are caught
/// too.
#[derive(Debug, Clone)]
pub struct SecretSet {
    secrets: Vec<Secret>,
    /// Automaton over non-empty first fragments; pattern id `i` maps to
    /// `first_fragment_owner[i]`.
    first_fragments: Option<AhoCorasick>,
    first_fragment_owner: Vec<usize>,
    /// Secrets whose first fragment is empty (the value starts with `\n`).
    /// They are candidates on every line.
    always_candidates: Vec<usize>,
    max_line_count: usize,
}

impl SecretSet {
    /// Build the set from raw secret values.
    ///
    /// Empty values and values made only of newlines are skipped, duplicates
    /// are collapsed.
    ///
    /// # Errors
    /// Returns [`FilterError::Automaton`] if the first-fragment automaton
    /// cannot be built.
    pub fn new<I, S>(values: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut plain = Vec::new();
        let mut escaped = Vec::new();

        for (idx, value) in values.into_iter().enumerate() {
            let value = value.as_ref();
            if !seen.insert(value.to_string()) {
                continue;
            }
            let Some(secret) = Secret::parse(value) else {
                tracing::warn!(secret_index = idx, "Ignoring secret without redactable content");
                continue;
            };
            if secret.is_multiline() {
                escaped.push(value.replace('\n', "\\n"));
            }
            plain.push(secret);
        }

        for value in escaped {
            if seen.insert(value.clone())
                && let Some(secret) = Secret::parse(&value)
            {
                plain.push(secret);
            }
        }

        Self::from_secrets(plain)
    }

    fn from_secrets(secrets: Vec<Secret>) -> Result<Self, FilterError> {
        let mut patterns = Vec::new();
        let mut first_fragment_owner = Vec::new();
        let mut always_candidates = Vec::new();

        for (idx, secret) in secrets.iter().enumerate() {
            if secret.first_fragment().is_empty() {
                always_candidates.push(idx);
            } else {
                patterns.push(secret.first_fragment().to_vec());
                first_fragment_owner.push(idx);
            }
        }

        let first_fragments = if patterns.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&patterns).map_err(|e| FilterError::Automaton {
                message: e.to_string(),
            })?)
        };

        let max_line_count = secrets.iter().map(Secret::line_count).max().unwrap_or(0);

        tracing::debug!(
            secret_count = secrets.len(),
            max_line_count,
            "Prepared secret set"
        );

        Ok(Self {
            secrets,
            first_fragments,
            first_fragment_owner,
            always_candidates,
            max_line_count,
        })
    }

    /// All secrets, escaped variants last.
    #[must_use]
    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    /// Secret by index.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Secret> {
        self.secrets.get(idx)
    }

    /// Number of secrets, escaped variants included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether there is nothing to redact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Largest number of lines any secret spans.
    #[must_use]
    pub fn max_line_count(&self) -> usize {
        self.max_line_count
    }

    /// Indexes of secrets whose first fragment occurs in `line`, ascending.
    #[must_use]
    pub fn first_fragment_hits(&self, line: &[u8]) -> Vec<usize> {
        let mut hits = self.always_candidates.clone();
        if let Some(automaton) = &self.first_fragments {
            for m in automaton.find_overlapping_iter(line) {
                hits.push(self.first_fragment_owner[m.pattern().as_usize()]);
            }
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Length of the longest suffix of `chunk` that could still grow into a
    /// secret occurrence once more bytes arrive.
    ///
    /// A suffix qualifies if it is a proper prefix of any fragment, or equals
    /// a fragment that must be followed by another line. A suffix equal to the
    /// last fragment of a secret is already redactable and does not qualify.
    #[must_use]
    pub fn unsafe_suffix_len(&self, chunk: &[u8]) -> usize {
        let mut longest = 0;
        for secret in &self.secrets {
            let last = secret.line_count() - 1;
            for (pos, fragment) in secret.fragments().iter().enumerate() {
                let max = fragment.len().min(chunk.len());
                for len in (longest + 1..=max).rev() {
                    let suffix = &chunk[chunk.len() - len..];
                    if !fragment.starts_with(suffix) {
                        continue;
                    }
                    if len < fragment.len() || pos < last {
                        longest = len;
                        break;
                    }
                }
            }
        }
        longest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(set: &SecretSet) -> Vec<Vec<&str>> {
        set.secrets()
            .iter()
            .map(|s| {
                s.fragments()
                    .iter()
                    .map(|f| std::str::from_utf8(f).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_single_line_secret() {
        let set = SecretSet::new(["secret value"]).unwrap();
        assert_eq!(fragments(&set), vec![vec!["secret value"]]);
    }

    #[test]
    fn test_multiline_secret_fragments() {
        let set = SecretSet::new(["multi\nline\nsecret"]).unwrap();
        assert_eq!(
            fragments(&set),
            vec![vec!["multi", "line", "secret"], vec!["multi\\nline\\nsecret"]]
        );
    }

    #[test]
    fn test_leading_trailing_and_inner_newlines() {
        let set = SecretSet::new(["\nstarting", "ending\n", "a\n\nb"]).unwrap();
        let got = fragments(&set);
        assert_eq!(got[0], vec!["", "starting"]);
        assert_eq!(got[1], vec!["ending", ""]);
        assert_eq!(got[2], vec!["a", "", "b"]);
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn test_escaped_variants_follow_configured_secrets() {
        let set = SecretSet::new(["a\nb\nc", "b", "c\nb", "f"]).unwrap();
        assert_eq!(
            fragments(&set),
            vec![
                vec!["a", "b", "c"],
                vec!["b"],
                vec!["c", "b"],
                vec!["f"],
                vec!["a\\nb\\nc"],
                vec!["c\\nb"],
            ]
        );
    }

    #[test]
    fn test_empty_and_newline_only_secrets_dropped() {
        let set = SecretSet::new(["", "\n", "\n\n", "ok"]).unwrap();
        assert_eq!(fragments(&set), vec![vec!["ok"]]);
    }

    #[test]
    fn test_duplicates_collapsed() {
        let set = SecretSet::new(["same", "same", "other"]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_first_fragment_hits() {
        let set = SecretSet::new(["abc", "bc", "zz", "\nq"]).unwrap();
        // "\nq" has an empty first fragment and hits everywhere.
        assert_eq!(set.first_fragment_hits(b"xabcx"), vec![0, 1, 3]);
        assert_eq!(set.first_fragment_hits(b"nothing"), vec![3]);
    }

    #[test]
    fn test_max_line_count() {
        let set = SecretSet::new(["a", "b\nc\nd"]).unwrap();
        assert_eq!(set.max_line_count(), 3);
        assert!(SecretSet::new(Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_suffix_len() {
        let set = SecretSet::new(["abcdef", "key\nvalue"]).unwrap();
        assert_eq!(set.unsafe_suffix_len(b"token: abc"), 3);
        assert_eq!(set.unsafe_suffix_len(b"token: xyz"), 0);
        // A complete non-final fragment still has to wait for the next line.
        assert_eq!(set.unsafe_suffix_len(b"the key"), 3);
        // A complete final fragment is redactable as is.
        assert_eq!(set.unsafe_suffix_len(b"the value"), 0);
        // A complete single-line secret is redactable as is.
        assert_eq!(set.unsafe_suffix_len(b"got abcdef"), 0);
    }
}
