//! Comparison history
//!
//! Comparison results travel through logs as a colon-delimited stack, most
//! recent first (`"DESYNC:D002:USE_INCOMING:D001"`). [`pack`] pushes onto such
//! a string and [`extract_comparison_state`] peeks the latest value.
//!
//! The stack grows without bound when used as a running log, so the
//! reconciler keeps its history in [`ComparisonHistory`] instead: a fixed-size
//! ring that can still render the packed form on demand.

use crate::outcome::Comparison;
use std::collections::VecDeque;

/// Default number of comparisons kept for diagnostics.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Prepend `new_result` to `past_results`.
pub fn pack(new_result: &str, past_results: &str) -> String {
    format!("{}:{}", new_result, past_results)
}

/// The most recent entry of a packed stack.
pub fn extract_comparison_state(packed: &str) -> &str {
    packed.split(':').next().unwrap_or(packed)
}

/// Bounded, most-recent-first record of comparison results.
#[derive(Clone, Debug)]
pub struct ComparisonHistory {
    entries: VecDeque<Comparison>,
    capacity: usize,
}

impl ComparisonHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a result, evicting the oldest when full.
    pub fn push(&mut self, comparison: Comparison) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(comparison);
    }

    pub fn latest(&self) -> Option<&Comparison> {
        self.entries.front()
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Comparison> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render as a packed stack of outcome names.
    pub fn to_packed(&self) -> String {
        self.entries
            .iter()
            .rev()
            .fold(String::new(), |past, cmp| {
                if past.is_empty() {
                    cmp.outcome.as_str().to_string()
                } else {
                    pack(cmp.outcome.as_str(), &past)
                }
            })
    }
}

impl Default for ComparisonHistory {
    fn default() -> Self {
        Self::new()
    }
}
