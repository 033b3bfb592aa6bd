//! Broadcast channel reachable from every execution context.
//!
//! Fire-and-forget publish/subscribe: a message carries a topic string and
//! a JSON payload. Delivery is multicast, best-effort and at-most-once, and
//! the sender's own context receives its messages too. Echo suppression is
//! the subscriber's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;

/// Default per-subscriber buffer for [`LocalBus`].
const DEFAULT_CAPACITY: usize = 256;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Routing topic, e.g. `"sync:10:VaultState:folders_update"`.
    pub topic: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
}

impl BusMessage {
    /// Build a message.
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Broadcast channel contract.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Publish a message to every subscriber in every context.
    ///
    /// Having no subscribers is not an error.
    async fn send(&self, message: BusMessage) -> Result<()>;

    /// Receive every message sent after this call, from any context.
    fn subscribe(&self) -> broadcast::Receiver<BusMessage>;
}

/// In-process bus over [`tokio::sync::broadcast`].
///
/// Clones share the same channel. A subscriber that falls more than the
/// channel capacity behind loses the oldest messages.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` messages per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn send(&self, message: BusMessage) -> Result<()> {
        if let Err(broadcast::error::SendError(message)) = self.tx.send(message) {
            debug!(topic = %message.topic, "bus message dropped, no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }
}
