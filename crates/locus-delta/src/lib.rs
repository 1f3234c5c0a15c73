//! Locus Delta - ordered processing of Locus deltas
//!
//! This crate turns the pure comparison rules of `locus-core` into a
//! processing loop:
//! - [`queue`] - FIFO of incoming delta events
//! - [`reconciler`] - the pausable state machine that owns the working copy
//!
//! ```text
//! socket ──► on_delta_event ──► queue ──► compare(working copy, delta)
//!                                              │
//!              USE_INCOMING / LOCUS_URL_CHANGED │ adopt, retry held
//!              KEEP_CURRENT                     │ drop
//!              WAIT                             │ hold
//!              DESYNC                           │ pause until resume
//!                                              ▼
//!                                   on_delta_action(outcome, delta)
//! ```
//!
//! # Example
//!
//! ```rust
//! use locus_core::{ComparisonOutcome, Locus, SequenceDescriptor};
//! use locus_delta::LocusDeltaReconciler;
//! use std::sync::Arc;
//!
//! let mut reconciler = LocusDeltaReconciler::new();
//! reconciler.on_delta_action(|outcome: ComparisonOutcome, locus: &Arc<Locus>| {
//!     println!("{} -> {:?}", outcome, locus.sequence.terminal());
//! });
//!
//! reconciler.on_full_locus(Locus::new("https://locus/1", SequenceDescriptor::from_entries([1])));
//! reconciler.on_delta_event(
//!     Locus::new("https://locus/1", SequenceDescriptor::from_entries([2]))
//!         .with_base(SequenceDescriptor::from_entries([1])),
//! );
//!
//! assert_eq!(reconciler.working_copy().unwrap().sequence.terminal(), Some(2));
//! ```

pub mod queue;
pub mod reconciler;

pub use queue::DeltaEventQueue;
pub use reconciler::{
    DeltaAction, DeltaActionHandler, LocusDeltaReconciler, ParserStatus, ReconcilerConfig,
    ReconcilerConfigBuilder, ReconcilerStats,
};
