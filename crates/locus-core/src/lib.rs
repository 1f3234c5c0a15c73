//! Locus Core - ordering primitives for Locus delta reconciliation
//!
//! A Locus is the server-side document describing a meeting. The server
//! streams partial updates (deltas) over a socket; they may arrive late, out
//! of order, duplicated, or after the resource has moved to a new URL. This
//! crate holds the pure pieces used to decide what to do with each one:
//!
//! - [`sequence`] - sparse sequence descriptors (`entries`, `rangeStart`, `rangeEnd`)
//! - [`locus`] - the Locus envelope / working copy and socket event names
//! - [`compare`] - raw sequence ordering and the delta comparison rules
//! - [`outcome`] - the closed set of comparison outcomes and reason codes
//! - [`history`] - packed result stacks and the bounded comparison history
//! - [`gate`] - whether a full snapshot supersedes the working copy
//!
//! Nothing here performs I/O or logging; see `locus-delta` for the processing
//! loop built on top.

pub mod compare;
pub mod error;
pub mod gate;
pub mod history;
pub mod locus;
pub mod outcome;
pub mod sequence;

pub use compare::{compare, compare_sequence, RawComparison};
pub use error::{LocusError, Result};
pub use gate::{is_new_full_locus, is_new_full_locus_value};
pub use history::{extract_comparison_state, pack, ComparisonHistory, DEFAULT_HISTORY_CAPACITY};
pub use locus::{is_locus, DeltaEnvelope, Locus, LocusEventType, SocketEvent, WorkingCopy};
pub use outcome::{Comparison, ComparisonOutcome, Reason, UnknownOutcome};
pub use sequence::{SeqNo, SequenceDescriptor};
