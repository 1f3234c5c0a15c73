//! Error types for the Locus SDK.

use locus_core::LocusError;
use thiserror::Error;

/// Error type for SDK operations.
///
/// Only I/O boundaries produce these. Reconciliation itself never fails:
/// malformed or out-of-order deltas degrade to a no-op or a desync.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The socket side went away or refused a message.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A snapshot request failed.
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A snapshot request did not answer in time.
    #[error("Sync timed out waiting for {url}")]
    SyncTimeout { url: String },

    /// Neither a delta nor a full resync could be completed.
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The transport was closed.
    #[error("Closed")]
    Closed,
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<LocusError> for SdkError {
    fn from(err: LocusError) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
