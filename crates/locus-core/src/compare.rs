//! Locus sequence comparison
//!
//! Two layers:
//!
//! 1. [`compare_sequence`] orders two bare descriptors by their terminal
//!    sequence number.
//! 2. [`compare`] orders two Locus revisions, adding relocation and
//!    contiguity checks on top of the raw ordering.
//!
//! ```text
//! url differs ──► incoming newer? ──yes──► LOCUS_URL_CHANGED
//!     │                          └─no───► KEEP_CURRENT
//!     │
//! same url ──► incoming newer? ──no───► KEEP_CURRENT
//!                   │
//!                  yes ──► base touches current ──► USE_INCOMING
//!                          base after current  ──► WAIT
//!                          base before current ──► DESYNC
//! ```

use crate::locus::Locus;
use crate::outcome::{Comparison, ComparisonOutcome, Reason};
use crate::sequence::SequenceDescriptor;
use std::cmp::Ordering;

/// Relationship between two descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawComparison {
    /// Neither side knows any entries.
    BothEmpty,
    /// Incoming is strictly newer.
    IncomingNewer,
    /// Current is strictly newer.
    CurrentNewer,
    /// Same terminal value. `history` orders the full entry lists
    /// (current vs incoming) for diagnostics.
    SameTerminal { history: Ordering },
}

impl RawComparison {
    pub fn is_incoming_newer(&self) -> bool {
        matches!(self, RawComparison::IncomingNewer)
    }
}

/// Compare two descriptors by terminal sequence number.
pub fn compare_sequence(
    current: &SequenceDescriptor,
    incoming: &SequenceDescriptor,
) -> RawComparison {
    match (current.terminal(), incoming.terminal()) {
        (None, None) => RawComparison::BothEmpty,
        (None, Some(_)) => RawComparison::IncomingNewer,
        (Some(_), None) => RawComparison::CurrentNewer,
        (Some(cur), Some(inc)) => match inc.cmp(&cur) {
            Ordering::Greater => RawComparison::IncomingNewer,
            Ordering::Less => RawComparison::CurrentNewer,
            Ordering::Equal => RawComparison::SameTerminal {
                history: current.entries.cmp(&incoming.entries),
            },
        },
    }
}

/// Decide what to do with `incoming` given the working copy `current`.
pub fn compare(current: &Locus, incoming: &Locus) -> Comparison {
    use ComparisonOutcome::*;

    let raw = compare_sequence(&current.sequence, &incoming.sequence);

    if incoming.url != current.url {
        // relocation wins over contiguity: the resource identity itself moved
        return match raw {
            RawComparison::IncomingNewer | RawComparison::BothEmpty => {
                Comparison::new(LocusUrlChanged, Reason::Relocated)
            }
            _ => Comparison::new(KeepCurrent, Reason::StaleRelocation),
        };
    }

    match raw {
        RawComparison::BothEmpty => Comparison::new(UseIncoming, Reason::EmptySequences),
        RawComparison::CurrentNewer => Comparison::new(KeepCurrent, Reason::IncomingStale),
        RawComparison::SameTerminal { .. } => Comparison::new(KeepCurrent, Reason::SameTerminal),
        RawComparison::IncomingNewer => check_contiguity(current, incoming),
    }
}

fn check_contiguity(current: &Locus, incoming: &Locus) -> Comparison {
    use ComparisonOutcome::*;

    let Some(base) = incoming.base_sequence.as_ref() else {
        return Comparison::new(UseIncoming, Reason::NoBaseSequence);
    };
    if current.sequence.is_empty() {
        return Comparison::new(UseIncoming, Reason::Bootstrap);
    }

    let (Some((cur_min, cur_max)), Some((base_min, base_max))) =
        (current.sequence.span(), base.span())
    else {
        return Comparison::new(Desync, Reason::EmptyBase);
    };

    if base.touches(&current.sequence) {
        Comparison::new(UseIncoming, Reason::Contiguous)
    } else if base_min > cur_max {
        Comparison::new(Wait, Reason::PredecessorPending)
    } else {
        debug_assert!(base_max < cur_min);
        Comparison::new(Desync, Reason::Gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq<const N: usize>(entries: [u64; N]) -> SequenceDescriptor {
        SequenceDescriptor::from_entries(entries)
    }

    fn locus<const N: usize>(url: &str, entries: [u64; N]) -> Locus {
        Locus::new(url, seq(entries))
    }

    #[test]
    fn test_empty_vs_empty_is_tie() {
        assert_eq!(compare_sequence(&seq([]), &seq([])), RawComparison::BothEmpty);
        let cmp = compare(&locus("a", []), &locus("a", []));
        assert_eq!(cmp.outcome, ComparisonOutcome::UseIncoming);
    }

    #[test]
    fn test_empty_vs_non_empty() {
        assert_eq!(compare_sequence(&seq([]), &seq([5])), RawComparison::IncomingNewer);
        assert_eq!(compare_sequence(&seq([5]), &seq([])), RawComparison::CurrentNewer);
    }

    #[test]
    fn test_terminal_comparison_uses_last_entry() {
        // first entry of incoming is lower, but the terminal decides
        assert_eq!(
            compare_sequence(&seq([10, 20]), &seq([5, 21])),
            RawComparison::IncomingNewer
        );
        assert_eq!(
            compare_sequence(&seq([10, 20]), &seq([30, 19])),
            RawComparison::CurrentNewer
        );
    }

    #[test]
    fn test_same_terminal_tie_break() {
        assert_eq!(
            compare_sequence(&seq([1, 5]), &seq([2, 5])),
            RawComparison::SameTerminal { history: Ordering::Less }
        );
        assert_eq!(
            compare_sequence(&seq([3, 5]), &seq([2, 5])),
            RawComparison::SameTerminal { history: Ordering::Greater }
        );
        assert_eq!(
            compare_sequence(&seq([5]), &seq([5])),
            RawComparison::SameTerminal { history: Ordering::Equal }
        );

        let cmp = compare(&locus("a", [1, 5]), &locus("a", [2, 5]));
        assert_eq!(cmp.outcome, ComparisonOutcome::KeepCurrent);
        assert_eq!(cmp.reason, Reason::SameTerminal);
    }

    #[test]
    fn test_contiguous_delta_is_adopted() {
        let current = locus("a", [100]);
        let incoming = locus("a", [101]).with_base(seq([100]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::UseIncoming, Reason::Contiguous)
        );
    }

    #[test]
    fn test_stale_delta_is_kept() {
        let current = locus("a", [101]);
        let incoming = locus("a", [100]).with_base(seq([99]));
        assert_eq!(compare(&current, &incoming).outcome, ComparisonOutcome::KeepCurrent);
    }

    #[test]
    fn test_gap_is_desync() {
        let current = locus("a", [100]);
        let incoming = locus("a", [200]).with_base(seq([50]).with_range(50, 50));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::Desync, Reason::Gap)
        );
    }

    #[test]
    fn test_missing_predecessor_waits() {
        let current = locus("a", [100]);
        let incoming = locus("a", [160]).with_base(seq([150]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::Wait, Reason::PredecessorPending)
        );
    }

    #[test]
    fn test_empty_base_is_desync() {
        let current = locus("a", [100]);
        let incoming = locus("a", [160]).with_base(seq([]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::Desync, Reason::EmptyBase)
        );
    }

    #[test]
    fn test_full_locus_through_compare() {
        let current = locus("a", [100]);
        let incoming = locus("a", [500]);
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::UseIncoming, Reason::NoBaseSequence)
        );
    }

    #[test]
    fn test_relocation_ignores_gap() {
        let current = locus("A", [100]);
        let incoming = locus("B", [200]).with_base(seq([999]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::LocusUrlChanged, Reason::Relocated)
        );
    }

    #[test]
    fn test_stale_relocation_is_kept() {
        let current = locus("A", [300]);
        let incoming = locus("B", [200]).with_base(seq([199]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::KeepCurrent, Reason::StaleRelocation)
        );
    }

    #[test]
    fn test_bootstrap_from_empty_working_copy() {
        let current = locus("a", []);
        let incoming = locus("a", [7]).with_base(seq([3]));
        assert_eq!(
            compare(&current, &incoming),
            Comparison::new(ComparisonOutcome::UseIncoming, Reason::Bootstrap)
        );
    }
}
