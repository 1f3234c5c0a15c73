//! Snapshot fetching.
//!
//! After a desync the session asks the server for state: a catch-up delta
//! from the working copy's `syncUrl`, or a full Locus from the meeting's
//! locus URL. [`LocusFetcher`] is that request; HTTP clients implement it
//! outside this crate.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Fetches Locus JSON by URL.
#[async_trait]
pub trait LocusFetcher: Send + Sync + 'static {
    /// `Ok(None)` means the server answered with an empty body: nothing
    /// newer than what the caller already has.
    async fn get_locus(&self, url: &str) -> Result<Option<Value>>;
}

/// In-memory fetcher serving canned responses, for testing and simulation.
#[derive(Default)]
pub struct MemoryFetcher {
    responses: RwLock<HashMap<String, Option<Value>>>,
    failing: RwLock<HashSet<String>>,
    requests: Mutex<Vec<String>>,
    delay: RwLock<Option<Duration>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn set_response(&self, url: impl Into<String>, body: Value) {
        self.responses.write().insert(url.into(), Some(body));
    }

    /// Serve an empty body for `url`.
    pub fn set_empty(&self, url: impl Into<String>) {
        self.responses.write().insert(url.into(), None);
    }

    pub fn remove_response(&self, url: &str) {
        self.responses.write().remove(url);
    }

    /// Make every request to `url` fail until [`recover`](Self::recover).
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.write().insert(url.into());
    }

    pub fn recover(&self, url: &str) {
        self.failing.write().remove(url);
    }

    /// Delay every response, to exercise timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// URLs requested so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LocusFetcher for MemoryFetcher {
    async fn get_locus(&self, url: &str) -> Result<Option<Value>> {
        self.requests.lock().push(url.to_string());

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().contains(url) {
            return Err(SdkError::Fetch {
                url: url.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        self.responses
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| SdkError::Fetch {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}
