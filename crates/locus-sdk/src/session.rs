//! Per-meeting Locus sessions.
//!
//! A session owns the reconciler for one meeting and turns its decisions
//! into [`LocusEvent`]s. Desyncs and relocations trigger a resync through
//! [`LocusSync`]; everything else is reported and left alone.

use crate::error::{Result, SdkError};
use crate::fetch::LocusFetcher;
use crate::sync::{LocusSync, SyncConfig, SyncOutcome};
use locus_core::{ComparisonOutcome, Locus, SeqNo, SocketEvent};
use locus_delta::{DeltaAction, LocusDeltaReconciler, ParserStatus, ReconcilerStats};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Events emitted by a session.
#[derive(Clone, Debug, PartialEq)]
pub enum LocusEvent {
    /// A delta became the working copy.
    DeltaApplied { sequence: Option<SeqNo> },
    /// A delta was stale or a duplicate.
    DeltaIgnored { sequence: Option<SeqNo> },
    /// A delta is waiting for its predecessor.
    DeltaHeld { sequence: Option<SeqNo> },
    /// History broke; a resync follows.
    Desync { sequence: Option<SeqNo> },
    /// The Locus moved to a new URL.
    UrlChanged { from: String, to: String },
    FullLocusApplied { sequence: Option<SeqNo> },
    FullLocusIgnored { sequence: Option<SeqNo> },
    SyncCompleted { outcome: SyncOutcome },
    SyncFailed { error: String },
}

/// Keeps one meeting's Locus in sync.
pub struct LocusSession<F: LocusFetcher> {
    meeting_id: String,
    locus_url: RwLock<String>,
    reconciler: Arc<Mutex<LocusDeltaReconciler>>,
    actions: Arc<Mutex<Vec<DeltaAction>>>,
    sync: LocusSync<F>,
    config: SyncConfig,
    event_tx: broadcast::Sender<LocusEvent>,
}

impl<F: LocusFetcher> LocusSession<F> {
    /// Create a new session.
    pub fn new(
        meeting_id: impl Into<String>,
        locus_url: impl Into<String>,
        fetcher: Arc<F>,
        config: SyncConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));

        let actions: Arc<Mutex<Vec<DeltaAction>>> = Arc::new(Mutex::new(Vec::new()));
        let mut reconciler = LocusDeltaReconciler::with_config(config.reconciler.clone());
        let sink = Arc::clone(&actions);
        reconciler.on_delta_action(move |outcome: ComparisonOutcome, locus: &Arc<Locus>| {
            sink.lock().push(DeltaAction {
                outcome,
                locus: Arc::clone(locus),
            });
        });

        Self {
            meeting_id: meeting_id.into(),
            locus_url: RwLock::new(locus_url.into()),
            reconciler: Arc::new(Mutex::new(reconciler)),
            actions,
            sync: LocusSync::new(fetcher, &config),
            config,
            event_tx,
        }
    }

    /// Get the meeting ID.
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// URL of the meeting's Locus; follows relocations.
    pub fn locus_url(&self) -> String {
        self.locus_url.read().clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<LocusEvent> {
        self.event_tx.subscribe()
    }

    pub fn working_copy(&self) -> Option<Arc<Locus>> {
        self.reconciler.lock().working_copy().cloned()
    }

    pub fn status(&self) -> ParserStatus {
        self.reconciler.lock().status()
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.reconciler.lock().stats().clone()
    }

    /// Packed comparison history, newest first.
    pub fn history(&self) -> String {
        self.reconciler.lock().history().to_packed()
    }

    /// Seed the session with the Locus returned when joining.
    pub fn initial_setup(&self, locus: Value) -> Result<()> {
        let locus = Locus::from_value(locus)?;
        info!(meeting_id = %self.meeting_id, url = %locus.url, "initial locus setup");
        self.apply_full_locus(locus);
        Ok(())
    }

    /// Route one socket envelope and act on whatever it caused.
    ///
    /// Returns an error only when a resync could not complete.
    pub async fn handle_socket_event(&self, event: Value) -> Result<()> {
        let event: SocketEvent = serde_json::from_value(event)?;
        let kind = event.kind();

        if kind.carries_full_locus() {
            match Locus::from_value(event.locus) {
                Ok(locus) => self.apply_full_locus(locus),
                Err(err) => info!(event_type = %kind, error = %err, "ignoring invalid full locus"),
            }
        } else {
            self.reconciler.lock().on_delta_value(event.locus);
        }

        self.process_actions().await
    }

    /// Force a resync with the server.
    pub async fn resync(&self) -> Result<SyncOutcome> {
        let locus_url = self.locus_url();
        match self.sync.run(&self.reconciler, &locus_url).await {
            Ok(outcome) => {
                self.follow_working_copy();
                info!(meeting_id = %self.meeting_id, outcome = ?outcome, "locus sync completed");
                let _ = self.event_tx.send(LocusEvent::SyncCompleted { outcome });
                Ok(outcome)
            }
            Err(err) => {
                warn!(meeting_id = %self.meeting_id, error = %err, "locus sync failed");
                let _ = self.event_tx.send(LocusEvent::SyncFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Consume socket events until the transport closes.
    ///
    /// A failed resync ends the loop with the error; malformed envelopes are
    /// logged and skipped.
    pub async fn run(&self, mut events: mpsc::Receiver<Value>) -> Result<()> {
        while let Some(event) = events.recv().await {
            match self.handle_socket_event(event).await {
                Ok(()) => {}
                Err(SdkError::Serialization(reason)) => {
                    info!(meeting_id = %self.meeting_id, reason = %reason, "ignoring malformed socket event");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// A fetched snapshot may live somewhere else than we asked.
    fn follow_working_copy(&self) {
        let url = self.working_copy().map(|w| w.url.clone()).unwrap_or_default();
        if !url.is_empty() && url != self.locus_url() {
            info!(meeting_id = %self.meeting_id, to = %url, "locus url follows resynced working copy");
            *self.locus_url.write() = url;
        }
    }

    fn apply_full_locus(&self, locus: Locus) {
        let sequence = locus.sequence.terminal();
        let url = locus.url.clone();

        if self.reconciler.lock().on_full_locus(locus) {
            if !url.is_empty() {
                *self.locus_url.write() = url;
            }
            let _ = self.event_tx.send(LocusEvent::FullLocusApplied { sequence });
        } else {
            let _ = self.event_tx.send(LocusEvent::FullLocusIgnored { sequence });
        }
    }

    async fn process_actions(&self) -> Result<()> {
        let mut resyncs = 0u32;

        loop {
            let actions = std::mem::take(&mut *self.actions.lock());
            if actions.is_empty() {
                return Ok(());
            }

            let mut needs_sync = false;
            for action in actions {
                needs_sync |= self.apply_delta_action(&action);
            }
            if !needs_sync {
                continue;
            }

            if resyncs >= self.config.max_consecutive_resyncs {
                let err = SdkError::SyncFailed(format!(
                    "still out of sync after {} resyncs",
                    resyncs
                ));
                warn!(meeting_id = %self.meeting_id, error = %err, "giving up on locus sync");
                let _ = self.event_tx.send(LocusEvent::SyncFailed {
                    error: err.to_string(),
                });
                return Err(err);
            }
            resyncs += 1;
            self.resync().await?;
        }
    }

    /// Report one reconciler decision. Returns true when a resync is due.
    fn apply_delta_action(&self, action: &DeltaAction) -> bool {
        let sequence = action.locus.sequence.terminal();

        match action.outcome {
            ComparisonOutcome::UseIncoming => {
                let _ = self.event_tx.send(LocusEvent::DeltaApplied { sequence });
                false
            }
            ComparisonOutcome::KeepCurrent => {
                let _ = self.event_tx.send(LocusEvent::DeltaIgnored { sequence });
                false
            }
            ComparisonOutcome::Wait => {
                let _ = self.event_tx.send(LocusEvent::DeltaHeld { sequence });
                false
            }
            ComparisonOutcome::Desync => {
                let _ = self.event_tx.send(LocusEvent::Desync { sequence });
                true
            }
            ComparisonOutcome::LocusUrlChanged => {
                let to = action.locus.url.clone();
                let from = std::mem::replace(&mut *self.locus_url.write(), to.clone());
                info!(meeting_id = %self.meeting_id, from = %from, to = %to, "locus url changed");
                let _ = self.event_tx.send(LocusEvent::UrlChanged { from, to });
                true
            }
        }
    }
}

impl<F: LocusFetcher> std::fmt::Debug for LocusSession<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocusSession")
            .field("meeting_id", &self.meeting_id)
            .field("locus_url", &*self.locus_url.read())
            .finish()
    }
}
