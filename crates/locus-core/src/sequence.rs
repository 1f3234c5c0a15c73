//! Sequence descriptors - the ordering metadata attached to every Locus revision
//!
//! A descriptor carries a sparse list of sequence numbers plus a contiguous
//! range the server claims to cover:
//!
//! ```text
//! { "entries": [95, 98, 100], "rangeStart": 1, "rangeEnd": 90 }
//!
//!   1 ─────────── 90      95   98  100
//!   └── range ───┘        └─ entries ─┘
//! ```
//!
//! The **last** entry is the authoritative current sequence number. Earlier
//! entries are bridge values kept for gap detection. An empty `entries` list
//! means "unknown": it is older than anything non-empty and ties with another
//! empty descriptor.

use serde::{Deserialize, Serialize};

/// A single sequence number
pub type SeqNo = u64;

/// Ordering position of one Locus revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDescriptor {
    /// Sequence numbers in arrival order; the last one is the terminal value
    #[serde(default)]
    pub entries: Vec<SeqNo>,
    /// Start of the claimed contiguous range, 0 when there is none
    pub range_start: SeqNo,
    /// End of the claimed contiguous range, 0 when there is none
    pub range_end: SeqNo,
}

impl SequenceDescriptor {
    /// Create an empty (uninitialised) descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor with the given entries and no range.
    pub fn from_entries(entries: impl IntoIterator<Item = SeqNo>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            range_start: 0,
            range_end: 0,
        }
    }

    /// Attach a contiguous range.
    pub fn with_range(mut self, range_start: SeqNo, range_end: SeqNo) -> Self {
        self.range_start = range_start;
        self.range_end = range_end;
        self
    }

    /// True when no entries are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when a range is present.
    pub fn has_range(&self) -> bool {
        self.range_start != 0 || self.range_end != 0
    }

    /// The authoritative current sequence number (last entry).
    pub fn terminal(&self) -> Option<SeqNo> {
        self.entries.last().copied()
    }

    /// The earliest entry in arrival order.
    pub fn first(&self) -> Option<SeqNo> {
        self.entries.first().copied()
    }

    /// Lowest and highest sequence numbers this descriptor speaks for.
    ///
    /// `min` is the range start when present, else the first entry; `max` is
    /// the last entry when present, else the range end. Returns `None` when
    /// neither entries nor a range are known.
    pub fn span(&self) -> Option<(SeqNo, SeqNo)> {
        let min = if self.range_start != 0 {
            Some(self.range_start)
        } else {
            self.first()
        };
        let max = match self.terminal() {
            Some(last) if last != 0 => Some(last),
            _ if self.range_end != 0 => Some(self.range_end),
            last => last,
        };

        match (min, max) {
            (Some(min), Some(max)) => Some((min.min(max), max.max(min))),
            (Some(v), None) | (None, Some(v)) => Some((v, v)),
            (None, None) => None,
        }
    }

    /// True when both spans overlap or sit directly next to each other.
    pub fn touches(&self, other: &SequenceDescriptor) -> bool {
        match (self.span(), other.span()) {
            (Some((a_min, a_max)), Some((b_min, b_max))) => {
                a_min <= b_max.saturating_add(1) && b_min <= a_max.saturating_add(1)
            }
            _ => false,
        }
    }

    /// True when `value` falls inside the claimed range.
    pub fn in_range(&self, value: SeqNo) -> bool {
        self.has_range() && value >= self.range_start && value <= self.range_end
    }
}

impl<const N: usize> From<[SeqNo; N]> for SequenceDescriptor {
    fn from(entries: [SeqNo; N]) -> Self {
        Self::from_entries(entries)
    }
}
