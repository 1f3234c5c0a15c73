//! Locus SDK - keep a meeting's Locus in sync over an unreliable socket
//!
//! The server streams Locus deltas over a socket that may drop, duplicate or
//! reorder them. This SDK wires the reconciler from `locus-delta` to the
//! outside world: socket events come in through an [`EventTransport`],
//! resync snapshots through a [`LocusFetcher`], and every decision goes out
//! as a [`LocusEvent`] broadcast.
//!
//! # Quick Start
//!
//! ```rust
//! use locus_core::{Locus, SequenceDescriptor, SocketEvent};
//! use locus_sdk::{Client, ClientConfig, LocusEvent};
//!
//! # tokio_test::block_on(async {
//! let client = Client::new_with_memory_fetcher(ClientConfig::default());
//! let session = client.create_session("meeting-1", "https://locus.example/loci/1");
//! let mut events = session.subscribe();
//!
//! let first = Locus::new("https://locus.example/loci/1", SequenceDescriptor::from_entries([1]));
//! session.initial_setup(first.to_value().unwrap()).unwrap();
//!
//! let delta = Locus::new("https://locus.example/loci/1", SequenceDescriptor::from_entries([2]))
//!     .with_base(SequenceDescriptor::from_entries([1]));
//! let envelope = serde_json::to_value(SocketEvent::delta(&delta).unwrap()).unwrap();
//! client.dispatch(envelope).await.unwrap();
//!
//! assert_eq!(events.try_recv().unwrap(), LocusEvent::FullLocusApplied { sequence: Some(1) });
//! assert_eq!(events.try_recv().unwrap(), LocusEvent::DeltaApplied { sequence: Some(2) });
//! # });
//! ```
//!
//! # Architecture
//!
//! - [`client`] - Registry of per-meeting sessions and socket dispatch
//! - [`session`] - One meeting: reconciler, event broadcast, resync trigger
//! - [`sync`] - Delta-then-full resync driver and its configuration
//! - [`transport`] - Socket event source abstraction
//! - [`fetch`] - Snapshot request abstraction
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod fetch;
pub mod session;
pub mod sync;
pub mod transport;

// Re-exports for convenience
pub use client::{Client, ClientConfig, ClientConfigBuilder};
pub use error::{Result, SdkError};
pub use fetch::{LocusFetcher, MemoryFetcher};
pub use session::{LocusEvent, LocusSession};
pub use sync::{LocusSync, SyncConfig, SyncConfigBuilder, SyncOutcome};
pub use transport::{EventTransport, MemoryTransport};

pub use locus_core::{ComparisonOutcome, Locus, LocusEventType, SequenceDescriptor, SocketEvent};
pub use locus_delta::{ParserStatus, ReconcilerConfig, ReconcilerConfigBuilder, ReconcilerStats};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{Client, ClientConfig};
    pub use crate::error::SdkError;
    pub use crate::fetch::LocusFetcher;
    pub use crate::session::{LocusEvent, LocusSession};
    pub use crate::sync::{SyncConfig, SyncOutcome};
    pub use crate::transport::EventTransport;
    pub use locus_core::{Locus, SequenceDescriptor};
}
