//! Resynchronization after a desync.
//!
//! ```text
//! working copy has syncUrl?
//!   yes ──► GET syncUrl ──ok, body──► queue as delta ─────┐
//!            │           ──ok, empty─► already current ───┤
//!            └─ error / timeout ─┐                         │
//!   no ─────────────────────────►├► GET locus url ──ok───► full locus gate
//!                                │                  └err─► SyncFailed
//!                                ▼                         │
//!                                                          ▼
//!                                                   resume(None)
//! ```
//!
//! Resuming drains whatever queued up during the pause; deltas the fetched
//! state already covers compare as `KEEP_CURRENT` and are dropped.

use crate::error::{Result, SdkError};
use crate::fetch::LocusFetcher;
use locus_core::Locus;
use locus_delta::{LocusDeltaReconciler, ReconcilerConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for sync behavior.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Timeout for snapshot requests (in milliseconds).
    pub sync_timeout_ms: u64,
    /// Capacity of the session event broadcast.
    pub event_buffer: usize,
    /// Resyncs allowed back to back while handling one socket event.
    pub max_consecutive_resyncs: u32,
    /// Reconciler settings for each session.
    pub reconciler: ReconcilerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: 5000,
            event_buffer: 100,
            max_consecutive_resyncs: 3,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn sync_timeout(mut self, ms: u64) -> Self {
        self.config.sync_timeout_ms = ms;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    pub fn max_consecutive_resyncs(mut self, count: u32) -> Self {
        self.config.max_consecutive_resyncs = count;
        self
    }

    pub fn reconciler(mut self, config: ReconcilerConfig) -> Self {
        self.config.reconciler = config;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// How a resync brought the working copy up to date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// A catch-up delta was queued.
    Delta,
    /// A full Locus was run through the full-locus gate.
    Full,
    /// The server had nothing newer.
    AlreadyCurrent,
}

/// Drives one resync against a reconciler.
pub struct LocusSync<F: LocusFetcher> {
    fetcher: Arc<F>,
    timeout: Duration,
}

impl<F: LocusFetcher> LocusSync<F> {
    pub fn new(fetcher: Arc<F>, config: &SyncConfig) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_millis(config.sync_timeout_ms),
        }
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Fetch fresh state for `locus_url` and resume the reconciler.
    ///
    /// On error the reconciler is left paused; the caller owns the decision
    /// to tear the meeting down.
    pub async fn run(
        &self,
        reconciler: &Mutex<LocusDeltaReconciler>,
        locus_url: &str,
    ) -> Result<SyncOutcome> {
        let sync_url = reconciler
            .lock()
            .working_copy()
            .and_then(|w| w.sync_url.clone());

        let outcome = match sync_url {
            Some(sync_url) => match self.delta_sync(reconciler, &sync_url).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(
                        sync_url = %sync_url,
                        error = %err,
                        "delta sync failed, falling back to full sync"
                    );
                    self.full_sync(reconciler, locus_url).await?
                }
            },
            None => self.full_sync(reconciler, locus_url).await?,
        };

        reconciler.lock().resume(None);
        Ok(outcome)
    }

    async fn delta_sync(
        &self,
        reconciler: &Mutex<LocusDeltaReconciler>,
        sync_url: &str,
    ) -> Result<SyncOutcome> {
        info!(sync_url = %sync_url, "starting delta sync");

        match self.fetch(sync_url).await? {
            Some(body) => {
                let delta = Locus::from_value(body)?;
                reconciler.lock().on_delta_event(delta);
                Ok(SyncOutcome::Delta)
            }
            None => {
                info!(sync_url = %sync_url, "delta sync returned nothing, already current");
                Ok(SyncOutcome::AlreadyCurrent)
            }
        }
    }

    async fn full_sync(
        &self,
        reconciler: &Mutex<LocusDeltaReconciler>,
        locus_url: &str,
    ) -> Result<SyncOutcome> {
        info!(locus_url = %locus_url, "starting full sync");

        let body = match self.fetch(locus_url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(locus_url = %locus_url, error = %err, "full sync failed");
                return Err(SdkError::SyncFailed(err.to_string()));
            }
        };

        let Some(body) = body else {
            return Ok(SyncOutcome::AlreadyCurrent);
        };
        let locus = Locus::from_value(body)
            .map_err(|err| SdkError::SyncFailed(format!("full locus rejected: {err}")))?;

        reconciler.lock().on_full_locus(locus);
        Ok(SyncOutcome::Full)
    }

    async fn fetch(&self, url: &str) -> Result<Option<Value>> {
        tokio::time::timeout(self.timeout, self.fetcher.get_locus(url))
            .await
            .map_err(|_| SdkError::SyncTimeout {
                url: url.to_string(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use locus_core::SequenceDescriptor;
    use locus_delta::ParserStatus;

    const URL: &str = "https://locus/1";
    const SYNC_URL: &str = "https://locus/1/sync";

    fn locus(seq: u64) -> Locus {
        Locus::new(URL, SequenceDescriptor::from_entries([seq]))
    }

    fn paused_at(working_copy: Locus) -> Mutex<LocusDeltaReconciler> {
        let mut reconciler = LocusDeltaReconciler::new();
        reconciler.on_full_locus(working_copy);
        reconciler.pause();
        Mutex::new(reconciler)
    }

    #[test]
    fn test_config_builder() {
        let config = SyncConfigBuilder::new()
            .sync_timeout(250)
            .event_buffer(8)
            .max_consecutive_resyncs(1)
            .build();

        assert_eq!(config.sync_timeout_ms, 250);
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.max_consecutive_resyncs, 1);
        assert_eq!(config.reconciler.max_hold, 5);
    }

    #[tokio::test]
    async fn test_full_sync_without_sync_url() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_response(URL, locus(50).to_value().unwrap());

        let reconciler = paused_at(locus(10));
        let sync = LocusSync::new(fetcher.clone(), &SyncConfig::default());

        let outcome = sync.run(&reconciler, URL).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Full);
        assert_eq!(fetcher.requests(), vec![URL.to_string()]);
        let reconciler = reconciler.lock();
        assert_eq!(reconciler.status(), ParserStatus::Idle);
        assert_eq!(
            reconciler.working_copy().and_then(|w| w.sequence.terminal()),
            Some(50)
        );
    }

    #[tokio::test]
    async fn test_delta_sync_from_sync_url() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let catch_up = locus(11).with_base(SequenceDescriptor::from_entries([10]));
        fetcher.set_response(SYNC_URL, catch_up.to_value().unwrap());

        let reconciler = paused_at(locus(10).with_sync_url(SYNC_URL));
        let sync = LocusSync::new(fetcher.clone(), &SyncConfig::default());

        assert_eq!(sync.run(&reconciler, URL).await.unwrap(), SyncOutcome::Delta);
        assert_eq!(fetcher.requests(), vec![SYNC_URL.to_string()]);
        assert_eq!(
            reconciler.lock().working_copy().and_then(|w| w.sequence.terminal()),
            Some(11)
        );
    }

    #[tokio::test]
    async fn test_empty_delta_is_already_current() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_empty(SYNC_URL);

        let reconciler = paused_at(locus(10).with_sync_url(SYNC_URL));
        let sync = LocusSync::new(fetcher, &SyncConfig::default());

        assert_eq!(
            sync.run(&reconciler, URL).await.unwrap(),
            SyncOutcome::AlreadyCurrent
        );
        assert_eq!(reconciler.lock().status(), ParserStatus::Idle);
    }

    #[tokio::test]
    async fn test_delta_failure_falls_back_to_full() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.fail(SYNC_URL);
        fetcher.set_response(URL, locus(99).to_value().unwrap());

        let reconciler = paused_at(locus(10).with_sync_url(SYNC_URL));
        let sync = LocusSync::new(fetcher.clone(), &SyncConfig::default());

        assert_eq!(sync.run(&reconciler, URL).await.unwrap(), SyncOutcome::Full);
        assert_eq!(
            fetcher.requests(),
            vec![SYNC_URL.to_string(), URL.to_string()]
        );
    }

    #[tokio::test]
    async fn test_full_failure_leaves_reconciler_paused() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.fail(URL);

        let reconciler = paused_at(locus(10));
        let sync = LocusSync::new(fetcher, &SyncConfig::default());

        let err = sync.run(&reconciler, URL).await.unwrap_err();
        assert!(matches!(err, SdkError::SyncFailed(_)));
        assert_eq!(reconciler.lock().status(), ParserStatus::Paused);
    }

    #[tokio::test]
    async fn test_slow_fetches_time_out() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_response(URL, locus(20).to_value().unwrap());
        fetcher.set_empty(SYNC_URL);
        fetcher.set_delay(Some(Duration::from_millis(500)));

        let reconciler = paused_at(locus(10).with_sync_url(SYNC_URL));
        let config = SyncConfigBuilder::new().sync_timeout(20).build();
        let sync = LocusSync::new(fetcher, &config);

        // both requests are slow, so the fallback times out as well
        let err = sync.run(&reconciler, URL).await.unwrap_err();
        assert!(matches!(err, SdkError::SyncFailed(_)));
    }
}
