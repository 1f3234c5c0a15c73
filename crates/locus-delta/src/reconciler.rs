//! Delta reconciliation state machine
//!
//! Deltas arrive from the socket in whatever order the network delivers
//! them. The reconciler queues them, compares each one against the working
//! copy and decides whether to adopt it, drop it, hold it for a missing
//! predecessor, or stop and ask for a resync.
//!
//! ```text
//!              on_delta_event
//!                    │
//!                    ▼
//!   ┌──────┐  handler set  ┌─────────┐  DESYNC   ┌────────┐
//!   │ Idle │──────────────►│ Working │──────────►│ Paused │
//!   └──────┘               └─────────┘           └────────┘
//!       ▲    queue empty        │                     │
//!       └───────────────────────┘◄────── resume ──────┘
//! ```
//!
//! ## Held events
//!
//! A delta whose base starts past the working copy extends a revision that
//! has not arrived yet (`WAIT`). It is parked in a side buffer and retried
//! after every adoption. Each freshly processed event ages the parked ones;
//! a parked event that never finds its predecessor escalates to `DESYNC`.
//!
//! The handler only sees the outcome and the event. It cannot reach back
//! into the reconciler, so draining is a plain loop and never re-enters.

use crate::queue::DeltaEventQueue;
use locus_core::{
    compare, is_new_full_locus, Comparison, ComparisonHistory, ComparisonOutcome, Locus, Reason,
    DEFAULT_HISTORY_CAPACITY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Processing state of the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParserStatus {
    /// Nothing to do; the next event starts a drain.
    Idle,
    /// Draining the queue.
    Working,
    /// Stopped on a desync until [`LocusDeltaReconciler::resume`].
    Paused,
}

impl fmt::Display for ParserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserStatus::Idle => "IDLE",
            ParserStatus::Working => "WORKING",
            ParserStatus::Paused => "PAUSED",
        };
        f.write_str(name)
    }
}

/// Configuration for the reconciler.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Comparisons kept for diagnostics.
    pub history_capacity: usize,
    /// Fresh events a held delta may outlive before it escalates.
    pub max_hold: usize,
    /// Held deltas allowed at once.
    pub max_held: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_hold: 5,
            max_held: 16,
        }
    }
}

/// Builder for reconciler configuration.
pub struct ReconcilerConfigBuilder {
    config: ReconcilerConfig,
}

impl ReconcilerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReconcilerConfig::default(),
        }
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    pub fn max_hold(mut self, events: usize) -> Self {
        self.config.max_hold = events;
        self
    }

    pub fn max_held(mut self, count: usize) -> Self {
        self.config.max_held = count;
        self
    }

    pub fn build(self) -> ReconcilerConfig {
        self.config
    }
}

impl Default for ReconcilerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives one notification per processed delta.
pub trait DeltaActionHandler: Send {
    fn on_delta_action(&mut self, outcome: ComparisonOutcome, locus: &Arc<Locus>);
}

impl<F> DeltaActionHandler for F
where
    F: FnMut(ComparisonOutcome, &Arc<Locus>) + Send,
{
    fn on_delta_action(&mut self, outcome: ComparisonOutcome, locus: &Arc<Locus>) {
        self(outcome, locus)
    }
}

/// An outcome paired with the event it was decided for.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaAction {
    pub outcome: ComparisonOutcome,
    pub locus: Arc<Locus>,
}

/// Counters for reconciler activity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerStats {
    /// Events taken off the queue.
    pub processed: u64,
    /// Deltas adopted at the same URL.
    pub adopted: u64,
    /// Deltas adopted at a new URL.
    pub relocations: u64,
    /// Deltas dropped as stale or duplicate.
    pub discarded: u64,
    /// Deltas parked for a missing predecessor.
    pub held: u64,
    /// Desyncs raised, escalations included.
    pub desyncs: u64,
    /// Held deltas that turned into desyncs.
    pub escalations: u64,
    pub full_accepted: u64,
    pub full_ignored: u64,
}

#[derive(Debug)]
struct HeldDelta {
    locus: Arc<Locus>,
    age: usize,
}

/// Ordered, pausable consumer of Locus deltas.
pub struct LocusDeltaReconciler {
    config: ReconcilerConfig,
    status: ParserStatus,
    queue: DeltaEventQueue<Arc<Locus>>,
    held: VecDeque<HeldDelta>,
    working_copy: Option<Arc<Locus>>,
    history: ComparisonHistory,
    handler: Option<Box<dyn DeltaActionHandler>>,
    stats: ReconcilerStats,
}

impl LocusDeltaReconciler {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let history = ComparisonHistory::with_capacity(config.history_capacity);
        Self {
            config,
            status: ParserStatus::Idle,
            queue: DeltaEventQueue::new(),
            held: VecDeque::new(),
            working_copy: None,
            history,
            handler: None,
            stats: ReconcilerStats::default(),
        }
    }

    /// Register the callback notified after each decision.
    ///
    /// Events queued before a handler exists wait for the next
    /// [`on_delta_event`](Self::on_delta_event) or [`resume`](Self::resume).
    pub fn on_delta_action(&mut self, handler: impl DeltaActionHandler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    /// Queue a delta and start draining when idle.
    pub fn on_delta_event(&mut self, envelope: Locus) {
        self.queue.enqueue(Arc::new(envelope));

        if self.status == ParserStatus::Idle && self.handler.is_some() {
            self.status = ParserStatus::Working;
            self.drain();
        }
    }

    /// Queue a raw JSON delta. Values that are not a Locus are dropped.
    pub fn on_delta_value(&mut self, value: Value) {
        match Locus::from_value(value) {
            Ok(locus) => self.on_delta_event(locus),
            Err(err) => info!(error = %err, "ignoring invalid locus delta"),
        }
    }

    /// Stop processing; queued events stay where they are.
    pub fn pause(&mut self) {
        info!(queued = self.queue.len(), "pausing delta processing");
        self.status = ParserStatus::Paused;
    }

    /// Continue after a pause, optionally replacing the working copy first.
    ///
    /// Held events go back to the front of the queue so they are compared
    /// against the fresh state before anything that arrived later.
    pub fn resume(&mut self, snapshot: Option<Locus>) {
        if let Some(snapshot) = snapshot {
            let url = snapshot.url.clone();
            self.working_copy = Some(Arc::new(snapshot));
            self.drop_held_elsewhere(&url);
        }

        let held: Vec<_> = self.held.drain(..).map(|h| h.locus).collect();
        info!(
            queued = self.queue.len(),
            reinstated = held.len(),
            "resuming delta processing"
        );
        self.queue.requeue_front(held);

        self.status = ParserStatus::Working;
        self.drain();
    }

    /// Adopt a full Locus if it is newer than the working copy.
    pub fn on_full_locus(&mut self, locus: Locus) -> bool {
        if !is_new_full_locus(self.working_copy.as_deref(), &locus) {
            info!(url = %locus.url, "ignoring old full locus");
            self.stats.full_ignored += 1;
            return false;
        }

        debug!(url = %locus.url, sequence = ?locus.sequence.terminal(), "applying full locus");
        let url = locus.url.clone();
        self.working_copy = Some(Arc::new(locus));
        self.stats.full_accepted += 1;
        self.drop_held_elsewhere(&url);

        if self.status != ParserStatus::Paused {
            self.retry_held();
        }
        true
    }

    pub fn working_copy(&self) -> Option<&Arc<Locus>> {
        self.working_copy.as_ref()
    }

    pub fn status(&self) -> ParserStatus {
        self.status
    }

    pub fn history(&self) -> &ComparisonHistory {
        &self.history
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    pub fn stats(&self) -> &ReconcilerStats {
        &self.stats
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Work loop
    // ------------------------------------------------------------------------

    fn drain(&mut self) {
        while self.status == ParserStatus::Working {
            let Some(incoming) = self.queue.dequeue() else {
                break;
            };

            self.age_held();
            if self.status != ParserStatus::Working {
                // an expired hold paused us; this event has not been looked at
                self.queue.requeue_front([incoming]);
                break;
            }

            self.stats.processed += 1;
            self.process(incoming);
        }

        if self.status == ParserStatus::Working {
            self.status = ParserStatus::Idle;
        }
    }

    fn process(&mut self, incoming: Arc<Locus>) {
        let comparison = match self.working_copy.as_deref() {
            None if incoming.sequence.is_empty() => {
                Comparison::new(ComparisonOutcome::KeepCurrent, Reason::EmptyIncoming)
            }
            None => Comparison::new(ComparisonOutcome::UseIncoming, Reason::NoWorkingCopy),
            Some(current) => compare(current, &incoming),
        };
        self.record(comparison);

        match comparison.outcome {
            ComparisonOutcome::UseIncoming | ComparisonOutcome::LocusUrlChanged => {
                self.adopt(comparison.outcome, incoming);
                self.retry_held();
            }
            ComparisonOutcome::KeepCurrent => {
                self.stats.discarded += 1;
                self.notify(comparison.outcome, &incoming);
            }
            ComparisonOutcome::Desync => {
                self.desync(&incoming);
            }
            ComparisonOutcome::Wait => {
                if self.held.len() >= self.config.max_held {
                    warn!(
                        held = self.held.len(),
                        url = %incoming.url,
                        "hold buffer full, escalating to desync"
                    );
                    self.escalate(Reason::HoldOverflow, &incoming);
                    return;
                }
                self.stats.held += 1;
                self.held.push_back(HeldDelta {
                    locus: Arc::clone(&incoming),
                    age: 0,
                });
                self.notify(comparison.outcome, &incoming);
            }
        }
    }

    fn adopt(&mut self, outcome: ComparisonOutcome, incoming: Arc<Locus>) {
        if outcome == ComparisonOutcome::LocusUrlChanged {
            self.stats.relocations += 1;
        } else {
            self.stats.adopted += 1;
        }
        self.working_copy = Some(Arc::clone(&incoming));
        self.notify(outcome, &incoming);

        if outcome == ComparisonOutcome::LocusUrlChanged {
            self.drop_held_elsewhere(&incoming.url);
        }
    }

    /// Discard held deltas that extend a revision at some other URL.
    fn drop_held_elsewhere(&mut self, url: &str) {
        let (kept, abandoned): (VecDeque<_>, VecDeque<_>) =
            self.held.drain(..).partition(|h| h.locus.url == url);
        self.held = kept;

        for held in abandoned {
            info!(from = %held.locus.url, to = %url, "dropping held delta for abandoned url");
            self.record(Comparison::new(ComparisonOutcome::KeepCurrent, Reason::AbandonedUrl));
            self.stats.discarded += 1;
            self.notify(ComparisonOutcome::KeepCurrent, &held.locus);
        }
    }

    fn desync(&mut self, incoming: &Arc<Locus>) {
        self.stats.desyncs += 1;
        self.pause();
        self.notify(ComparisonOutcome::Desync, incoming);
    }

    fn escalate(&mut self, reason: Reason, locus: &Arc<Locus>) {
        self.stats.escalations += 1;
        self.record(Comparison::new(ComparisonOutcome::Desync, reason));
        self.desync(locus);
    }

    /// Re-compare held events until none of them can move.
    fn retry_held(&mut self) {
        'scan: loop {
            let Some(current) = self.working_copy.clone() else {
                return;
            };

            for index in 0..self.held.len() {
                let comparison = compare(&current, &self.held[index].locus);
                if comparison.outcome == ComparisonOutcome::Wait {
                    continue;
                }

                let Some(held) = self.held.remove(index) else {
                    return;
                };
                self.record(comparison);

                match comparison.outcome {
                    ComparisonOutcome::UseIncoming | ComparisonOutcome::LocusUrlChanged => {
                        self.adopt(comparison.outcome, held.locus);
                    }
                    ComparisonOutcome::KeepCurrent => {
                        self.stats.discarded += 1;
                        self.notify(comparison.outcome, &held.locus);
                    }
                    ComparisonOutcome::Desync | ComparisonOutcome::Wait => {
                        self.desync(&held.locus);
                        return;
                    }
                }
                continue 'scan;
            }
            return;
        }
    }

    fn age_held(&mut self) {
        for held in self.held.iter_mut() {
            held.age += 1;
        }

        let max_hold = self.config.max_hold;
        if let Some(index) = self.held.iter().position(|h| h.age >= max_hold) {
            if let Some(expired) = self.held.remove(index) {
                warn!(
                    age = expired.age,
                    url = %expired.locus.url,
                    "held delta never found its predecessor, escalating to desync"
                );
                self.escalate(Reason::HoldExpired, &expired.locus);
            }
        }
    }

    fn record(&mut self, comparison: Comparison) {
        self.history.push(comparison);
        debug!(
            comparison = %comparison,
            history = %self.history.to_packed(),
            "locus comparison"
        );
    }

    fn notify(&mut self, outcome: ComparisonOutcome, locus: &Arc<Locus>) {
        info!(
            outcome = %outcome,
            url = %locus.url,
            sequence = ?locus.sequence.terminal(),
            "delta action"
        );
        if let Some(handler) = self.handler.as_mut() {
            handler.on_delta_action(outcome, locus);
        }
    }
}

impl Default for LocusDeltaReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocusDeltaReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocusDeltaReconciler")
            .field("status", &self.status)
            .field("queued", &self.queue.len())
            .field("held", &self.held.len())
            .field("working_copy", &self.working_copy)
            .field("stats", &self.stats)
            .finish()
    }
}
