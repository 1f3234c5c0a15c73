//! Full-locus gate
//!
//! Full snapshots arrive from participant events and from resync fetches.
//! They carry no base sequence, so contiguity does not apply; the only
//! question is whether the snapshot is newer than the working copy.

use crate::locus::{is_locus, Locus};
use serde_json::Value;

/// Should `incoming` replace the working copy outright?
pub fn is_new_full_locus(current: Option<&Locus>, incoming: &Locus) -> bool {
    let Some(current) = current else {
        return true;
    };

    match (current.sequence.terminal(), incoming.sequence.terminal()) {
        // empty incoming is an explicit reset from the server
        (Some(_), None) => true,
        (None, Some(_)) => true,
        (None, None) => true,
        (Some(cur), Some(inc)) => inc > cur,
    }
}

/// Same as [`is_new_full_locus`] for a raw JSON object; structurally invalid
/// objects are never new.
pub fn is_new_full_locus_value(current: Option<&Locus>, incoming: &Value) -> bool {
    if !is_locus(incoming) {
        return false;
    }
    match Locus::from_value(incoming.clone()) {
        Ok(incoming) => is_new_full_locus(current, &incoming),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceDescriptor;
    use serde_json::json;

    fn full<const N: usize>(entries: [u64; N]) -> Locus {
        Locus::new("https://locus/1", SequenceDescriptor::from_entries(entries))
    }

    #[test]
    fn test_no_working_copy_always_adopts() {
        assert!(is_new_full_locus(None, &full([])));
        assert!(is_new_full_locus(None, &full([1])));
    }

    #[test]
    fn test_newer_terminal_wins() {
        assert!(is_new_full_locus(Some(&full([10])), &full([11])));
        assert!(!is_new_full_locus(Some(&full([10])), &full([10])));
        assert!(!is_new_full_locus(Some(&full([10])), &full([9])));
    }

    #[test]
    fn test_empty_sides() {
        assert!(is_new_full_locus(Some(&full([10])), &full([])));
        assert!(is_new_full_locus(Some(&full([])), &full([10])));
        assert!(is_new_full_locus(Some(&full([])), &full([])));
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        assert!(!is_new_full_locus_value(None, &json!({"sequence": {"entries": [5]}})));
        assert!(!is_new_full_locus_value(None, &json!("not an object")));
        assert!(is_new_full_locus_value(
            None,
            &json!({"sequence": {"entries": [5], "rangeStart": 0, "rangeEnd": 0}})
        ));
    }
}
