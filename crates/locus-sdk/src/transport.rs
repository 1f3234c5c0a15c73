//! Socket transport abstraction.
//!
//! The server pushes Locus events as JSON envelopes
//! (`{ "eventType": "locus.difference", "locus": { ... } }`). A transport only
//! has to hand those over in the order it received them; it gives no
//! guarantee that the server sent them in that order, or sent each once.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;

/// Source of raw socket events.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// Take the receiving end of the event stream.
    fn subscribe(&self) -> Result<mpsc::Receiver<Value>>;

    /// Stop delivering; receivers see the end of the stream once drained.
    async fn close(&self);
}

/// In-memory transport for testing and simulation.
pub struct MemoryTransport {
    event_tx: RwLock<Option<mpsc::Sender<Value>>>,
    event_rx: Mutex<Option<mpsc::Receiver<Value>>>,
}

impl MemoryTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            event_tx: RwLock::new(Some(tx)),
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Push one envelope as if it came off the socket.
    pub async fn deliver(&self, event: Value) -> Result<()> {
        let tx = self.event_tx.read().clone().ok_or(SdkError::Closed)?;
        tx.send(event)
            .await
            .map_err(|e| SdkError::Transport(e.to_string()))
    }

    /// Non-blocking variant of [`deliver`](Self::deliver).
    pub fn try_deliver(&self, event: Value) -> Result<()> {
        let tx = self.event_tx.read().clone().ok_or(SdkError::Closed)?;
        tx.try_send(event)
            .map_err(|e| SdkError::Transport(e.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.read().is_none()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    fn subscribe(&self) -> Result<mpsc::Receiver<Value>> {
        self.event_rx
            .lock()
            .take()
            .ok_or_else(|| SdkError::Transport("already subscribed".to_string()))
    }

    async fn close(&self) {
        self.event_tx.write().take();
    }
}
