//! High-level client for the Locus SDK.

use crate::error::{Result, SdkError};
use crate::fetch::{LocusFetcher, MemoryFetcher};
use crate::session::LocusSession;
use crate::sync::SyncConfig;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Configuration for the Locus client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// URL identifying this device to the server.
    pub device_url: String,
    /// Settings shared by every session.
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_url: "local-device".to_string(),
            sync: SyncConfig::default(),
        }
    }
}

/// Builder for client configuration.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn device_url(mut self, url: impl Into<String>) -> Self {
        self.config.device_url = url.into();
        self
    }

    pub fn sync(mut self, config: SyncConfig) -> Self {
        self.config.sync = config;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of per-meeting Locus sessions.
///
/// # Example
///
/// ```rust
/// use locus_sdk::{Client, ClientConfig};
///
/// let client = Client::new_with_memory_fetcher(ClientConfig::default());
/// let session = client.create_session("meeting-1", "https://locus.example/loci/1");
///
/// assert_eq!(session.locus_url(), "https://locus.example/loci/1");
/// assert!(client.find_by_locus_url("https://locus.example/loci/1").is_some());
/// ```
pub struct Client<F: LocusFetcher> {
    config: ClientConfig,
    fetcher: Arc<F>,
    sessions: Arc<RwLock<HashMap<String, Arc<LocusSession<F>>>>>,
}

impl Client<MemoryFetcher> {
    /// Create a new client with an in-memory fetcher (for testing).
    pub fn new_with_memory_fetcher(config: ClientConfig) -> Self {
        Self::new(Arc::new(MemoryFetcher::new()), config)
    }
}

impl<F: LocusFetcher> Client<F> {
    /// Create a new client with a custom fetcher.
    pub fn new(fetcher: Arc<F>, config: ClientConfig) -> Self {
        Self {
            config,
            fetcher,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the fetcher.
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Create a session for a meeting, or return the existing one.
    pub fn create_session(
        &self,
        meeting_id: impl Into<String>,
        locus_url: impl Into<String>,
    ) -> Arc<LocusSession<F>> {
        let meeting_id = meeting_id.into();
        let mut sessions = self.sessions.write();

        if let Some(session) = sessions.get(&meeting_id) {
            session.clone()
        } else {
            let locus_url = locus_url.into();
            info!(
                device_url = %self.config.device_url,
                meeting_id = %meeting_id,
                locus_url = %locus_url,
                "creating locus session"
            );
            let session = Arc::new(LocusSession::new(
                meeting_id.clone(),
                locus_url,
                self.fetcher.clone(),
                self.config.sync.clone(),
            ));
            sessions.insert(meeting_id, session.clone());
            session
        }
    }

    /// Get an existing session.
    pub fn get_session(&self, meeting_id: &str) -> Option<Arc<LocusSession<F>>> {
        self.sessions.read().get(meeting_id).cloned()
    }

    /// Close a session. Returns false if there was none.
    pub fn close_session(&self, meeting_id: &str) -> bool {
        self.sessions.write().remove(meeting_id).is_some()
    }

    /// List all active meeting IDs.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// The session currently tracking `locus_url`.
    pub fn find_by_locus_url(&self, locus_url: &str) -> Option<Arc<LocusSession<F>>> {
        self.sessions
            .read()
            .values()
            .find(|session| session.locus_url() == locus_url)
            .cloned()
    }

    /// Hand a socket envelope to the session whose Locus it belongs to.
    ///
    /// A relocated Locus arrives under its new URL; it is matched through
    /// the URL it replaces.
    pub async fn dispatch(&self, event: Value) -> Result<()> {
        let locus_url = event
            .get("locus")
            .and_then(|locus| locus.get("url"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let session = self
            .find_by_locus_url(&locus_url)
            .or_else(|| {
                let replaced = replaced_locus_url(&event)?;
                info!(locus_url = %locus_url, replaced = %replaced, "routing relocated locus");
                self.find_by_locus_url(replaced)
            })
            .ok_or(SdkError::SessionNotFound(locus_url))?;

        session.handle_socket_event(event).await
    }
}

/// `locusUrl` of the last entry in `locus.replaces`.
fn replaced_locus_url(event: &Value) -> Option<&str> {
    event
        .get("locus")?
        .get("replaces")?
        .as_array()?
        .last()?
        .get("locusUrl")?
        .as_str()
}
