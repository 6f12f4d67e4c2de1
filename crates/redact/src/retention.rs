//! Deciding which buffered lines may leave the filter.

use crate::matching::{MatchRecord, PartialMatchSet};
use crate::redaction::{MatchRange, all_ranges, secret_fragments_for_line};
use crate::secrets::SecretSet;

/// First window line that has to stay buffered, or `None` if every line may
/// be emitted.
///
/// A partial match starting on line `p` means lines `p..` could still turn
/// out to be part of a secret, so the window is kept from the lowest one.
#[must_use]
pub fn lines_to_keep_from(partials: &PartialMatchSet) -> Option<usize> {
    partials.first().copied()
}

/// Split `lines` into the lines to emit now and the lines to retain.
#[must_use]
pub fn split_window<T>(lines: Vec<T>, keep_from: Option<usize>) -> (Vec<T>, Vec<T>) {
    match keep_from {
        None => (lines, Vec::new()),
        Some(first) => {
            let mut emit = lines;
            let keep = emit.split_off(first.min(emit.len()));
            (emit, keep)
        }
    }
}

/// Fragments a retained line has to be redacted with once it is emitted.
///
/// A full match may begin on an emitted line and continue onto retained ones.
/// It cannot be found again after its first line has left, so the fragments
/// it places on the retained lines travel with them.
#[must_use]
pub fn carried_fragments(
    secrets: &SecretSet,
    matches: &MatchRecord,
    keep_from: usize,
    window_len: usize,
) -> Vec<Vec<Vec<u8>>> {
    (keep_from..window_len)
        .map(|line_idx| {
            secret_fragments_for_line(secrets, line_idx, matches)
                .into_iter()
                .filter(|fragment| !fragment.is_empty())
                .map(<[u8]>::to_vec)
                .collect()
        })
        .collect()
}

/// How many leading bytes of an unterminated chunk may leave as a line of
/// their own.
///
/// The cut never lands inside the longest suffix that could still grow into
/// a secret, nor inside any fragment occurrence already present in `pending`.
/// Zero means nothing can be released yet.
#[must_use]
pub fn pending_release_len(secrets: &SecretSet, pending: &[u8]) -> usize {
    let mut cut = pending.len() - secrets.unsafe_suffix_len(pending);
    if cut == 0 {
        return 0;
    }

    let occurrences: Vec<MatchRange> = secrets
        .secrets()
        .iter()
        .flat_map(|secret| secret.fragments())
        .flat_map(|fragment| all_ranges(pending, fragment))
        .collect();

    // Moving the cut back can land it inside an earlier occurrence.
    while let Some(first) = occurrences
        .iter()
        .filter(|range| range.first < cut && range.last > cut)
        .map(|range| range.first)
        .min()
    {
        cut = first;
    }
    cut
}
