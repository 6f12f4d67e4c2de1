//! Replacing matched fragments with the placeholder.

use memchr::memmem;

use crate::error::{FilterError, Result};
use crate::matching::MatchRecord;
use crate::secrets::SecretSet;

/// Placeholder for redacted secrets
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Half-open byte range `[first, last)` within one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchRange {
    /// Start offset
    pub first: usize,
    /// End offset (exclusive)
    pub last: usize,
}

impl MatchRange {
    /// Create a range
    #[must_use]
    pub const fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }
}

/// Every occurrence of `needle` in `line`, overlapping ones included.
#[must_use]
pub fn all_ranges(line: &[u8], needle: &[u8]) -> Vec<MatchRange> {
    if needle.is_empty() {
        return Vec::new();
    }

    // memmem::find_iter skips overlapping occurrences, so restart one byte
    // after each hit instead.
    let finder = memmem::Finder::new(needle);
    let mut ranges = Vec::new();
    let mut from = 0;
    while let Some(offset) = line.get(from..).and_then(|rest| finder.find(rest)) {
        let first = from + offset;
        ranges.push(MatchRange::new(first, first + needle.len()));
        from = first + 1;
    }
    ranges
}

/// Sort ranges and coalesce the ones that overlap or touch.
#[must_use]
pub fn merge_ranges(mut ranges: Vec<MatchRange>) -> Vec<MatchRange> {
    ranges.sort_unstable();
    let mut merged: Vec<MatchRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(prev) if range.first <= prev.last => prev.last = prev.last.max(range.last),
            _ => merged.push(range),
        }
    }
    merged
}

/// Replace each of the sorted, disjoint `ranges` of `line` with the
/// placeholder.
///
/// # Errors
/// Returns [`FilterError::Internal`] if a range is inverted, out of bounds or
/// out of order. The line is not emitted in that case.
pub fn redact_line(line: &[u8], ranges: &[MatchRange]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(line.len());
    let mut cursor = 0;
    for range in ranges {
        if range.first < cursor || range.first > range.last || range.last > line.len() {
            return Err(FilterError::internal(format!(
                "redaction range {}..{} invalid for line of {} bytes",
                range.first,
                range.last,
                line.len()
            )));
        }
        out.extend_from_slice(&line[cursor..range.first]);
        out.extend_from_slice(REDACTED_PLACEHOLDER.as_bytes());
        cursor = range.last;
    }
    out.extend_from_slice(&line[cursor..]);
    Ok(out)
}

/// Fragments that have to be blanked out on window line `line_idx`.
///
/// For each full match covering the line, the fragment at the line's offset
/// within that match applies.
#[must_use]
pub fn secret_fragments_for_line<'a>(
    secrets: &'a SecretSet,
    line_idx: usize,
    matches: &MatchRecord,
) -> Vec<&'a [u8]> {
    matches
        .iter()
        .filter(|(_, start)| *start <= line_idx)
        .filter_map(|(secret_idx, start)| {
            secrets
                .get(secret_idx)?
                .fragments()
                .get(line_idx - start)
                .map(Vec::as_slice)
        })
        .collect()
}

/// Redact every occurrence of each of `fragments` in `line`.
///
/// # Errors
/// Propagates [`redact_line`] failures.
pub fn redact_fragments<'a, I>(line: &[u8], fragments: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let ranges: Vec<MatchRange> = fragments
        .into_iter()
        .flat_map(|fragment| all_ranges(line, fragment))
        .collect();
    if ranges.is_empty() {
        return Ok(line.to_vec());
    }
    redact_line(line, &merge_ranges(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redacted(line: &str, ranges: &[MatchRange]) -> String {
        String::from_utf8(redact_line(line.as_bytes(), ranges).unwrap()).unwrap()
    }

    fn lines(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    fn redact_lines(set: &SecretSet, window: Vec<Vec<u8>>, matches: &MatchRecord) -> Vec<Vec<u8>> {
        window
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                redact_fragments(line, secret_fragments_for_line(set, idx, matches)).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_redact_middle() {
        assert_eq!(
            redacted("asdfabcasdf", &[MatchRange::new(4, 7)]),
            "asdf[REDACTED]asdf"
        );
    }

    #[test]
    fn test_redact_beginning_and_end() {
        assert_eq!(
            redacted("asdfabcasdf", &[MatchRange::new(0, 5)]),
            "[REDACTED]bcasdf"
        );
        assert_eq!(
            redacted("asdfabcasdf", &[MatchRange::new(9, 11)]),
            "asdfabcas[REDACTED]"
        );
    }

    #[test]
    fn test_redact_two_ranges() {
        assert_eq!(
            redacted(
                "asdfabcasdf",
                &[MatchRange::new(4, 7), MatchRange::new(8, 10)]
            ),
            "asdf[REDACTED]a[REDACTED]f"
        );
    }

    #[test]
    fn test_overlapping_ranges_collapse_to_one_placeholder() {
        let merged = merge_ranges(vec![
            MatchRange::new(0, 4),
            MatchRange::new(7, 11),
            MatchRange::new(3, 9),
        ]);
        assert_eq!(merged, vec![MatchRange::new(0, 11)]);
        assert_eq!(redacted("asdfabcasdf", &merged), "[REDACTED]");
    }

    #[test]
    fn test_touching_ranges_merge() {
        let merged = merge_ranges(vec![MatchRange::new(2, 4), MatchRange::new(0, 2)]);
        assert_eq!(merged, vec![MatchRange::new(0, 4)]);
    }

    #[test]
    fn test_all_ranges_overlapping() {
        assert_eq!(
            all_ranges(b"aaaa", b"aa"),
            vec![
                MatchRange::new(0, 2),
                MatchRange::new(1, 3),
                MatchRange::new(2, 4)
            ]
        );
        assert!(all_ranges(b"abc", b"").is_empty());
        assert!(all_ranges(b"abc", b"zz").is_empty());
    }

    #[test]
    fn test_invalid_range_fails_closed() {
        let err = redact_line(b"short", &[MatchRange::new(2, 10)]).unwrap_err();
        assert!(matches!(err, FilterError::Internal { .. }));
        let err = redact_line(
            b"short line",
            &[MatchRange::new(4, 6), MatchRange::new(1, 2)],
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::Internal { .. }));
    }

    #[test]
    fn test_fragments_for_line() {
        let set = SecretSet::new(["a\nb\nc", "b"]).unwrap();
        let mut matches = MatchRecord::default();
        matches.insert(0, 1);
        matches.insert(1, 2);
        matches.insert(1, 4);

        assert!(secret_fragments_for_line(&set, 0, &matches).is_empty());
        assert_eq!(
            secret_fragments_for_line(&set, 1, &matches),
            vec![b"a".as_slice()]
        );
        assert_eq!(
            secret_fragments_for_line(&set, 2, &matches),
            vec![b"b".as_slice(), b"b".as_slice()]
        );
        assert_eq!(
            secret_fragments_for_line(&set, 3, &matches),
            vec![b"c".as_slice()]
        );
        assert_eq!(
            secret_fragments_for_line(&set, 4, &matches),
            vec![b"b".as_slice()]
        );
    }

    #[test]
    fn test_redact_lines_multiline_match() {
        let set = SecretSet::new(["a\nb\nc", "b"]).unwrap();
        let mut matches = MatchRecord::default();
        matches.insert(0, 2);
        matches.insert(1, 3);

        let out = redact_lines(&set, lines(&["x\n", "a\n", "a\n", "b\n", "c\n"]), &matches);
        assert_eq!(
            out,
            lines(&["x\n", "a\n", "[REDACTED]\n", "[REDACTED]\n", "[REDACTED]\n"])
        );
    }

    #[test]
    fn test_redact_lines_far_apart() {
        let set = SecretSet::new(["106\n105", "99"]).unwrap();
        let mut matches = MatchRecord::default();
        matches.insert(0, 0);
        matches.insert(1, 7);

        let window = lines(&[
            "106\n", "105\n", "104\n", "103\n", "102\n", "101\n", "100\n", "99\n",
        ]);
        let out = redact_lines(&set, window, &matches);
        assert_eq!(
            out,
            lines(&[
                "[REDACTED]\n",
                "[REDACTED]\n",
                "104\n",
                "103\n",
                "102\n",
                "101\n",
                "100\n",
                "[REDACTED]\n",
            ])
        );
    }
}
