//! Sync binding: one reactive container wired to one store slot.
//!
//! Local emissions are written through to the session store and announced
//! on the bus as `"{slot}_update"` with the binding's instance id. Peers
//! receiving the announcement re-read the slot from the store (never the
//! message) and push the decoded value into their own container. Two rules
//! keep this from looping:
//!
//! - a binding ignores announcements carrying its own instance id
//! - after pushing a remote value it skips the next local emission, which
//!   is that very push; the first emission after `init()` (the container's
//!   baseline) is skipped the same way
//!
//! A binding lives as long as its owner keeps it. Dropping the last handle
//! stops the event task, leaves the bus and frees the container for a new
//! binding.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::codec::{InitializeAs, ValueCodec};
use super::slot::Slot;
use crate::bus::{BusMessage, MessageBus};
use crate::error::{Result, SyncError};
use crate::reactive::{Reactive, Subscription};
use crate::store::SessionStore;

/// Payload key carrying the sender's instance id.
const INSTANCE_ID_KEY: &str = "instance_id";

/// What happened to one local emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    /// Baseline or remote-originated emission; nothing written.
    Skipped,
    /// Written to the store and announced.
    Written,
    /// Encoding, store or bus failure; logged and dropped.
    Failed,
}

/// What happened to one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Message was for another slot.
    OtherTopic,
    /// Message was this binding's own announcement.
    Echo,
    /// Slot had never been written; nothing to pull.
    Absent,
    /// Store value decoded and pushed into the container.
    Applied,
}

/// Per-binding counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Local emissions written through to the store.
    pub local_writes: u64,
    /// Local emissions skipped (baseline or remote push).
    pub skipped_emissions: u64,
    /// Remote updates pulled from the store and applied.
    pub remote_pulls: u64,
    /// Store re-reads after the bus dropped messages.
    pub resyncs: u64,
    /// Own announcements ignored.
    pub echoes_suppressed: u64,
    /// Write-through or pull failures.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    local_writes: AtomicU64,
    skipped_emissions: AtomicU64,
    remote_pulls: AtomicU64,
    resyncs: AtomicU64,
    echoes_suppressed: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SyncStats {
        SyncStats {
            local_writes: self.local_writes.load(Ordering::Relaxed),
            skipped_emissions: self.skipped_emissions.load(Ordering::Relaxed),
            remote_pulls: self.remote_pulls.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            echoes_suppressed: self.echoes_suppressed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Type-erased view of a binding, as kept by a [`SyncRegistration`](super::registry::SyncRegistration).
pub trait AnyBinding: Send + Sync + fmt::Debug {
    /// Store key this binding synchronizes.
    fn slot(&self) -> &Slot;
    /// Id distinguishing this binding from its peers in other contexts.
    fn instance_id(&self) -> Uuid;
    /// Collection shape of the bound value.
    fn shape(&self) -> InitializeAs;
    /// Start listening. See [`SyncBinding::init`].
    fn init(&self) -> Result<()>;
    /// Whether `init()` started the event task.
    fn is_active(&self) -> bool;
    /// Counter snapshot.
    fn stats(&self) -> SyncStats;
}

/// Binds one [`Reactive`] to one store [`Slot`].
pub struct SyncBinding<V> {
    this: Weak<Self>,
    container: Reactive<V>,
    slot: Slot,
    topic: String,
    codec: ValueCodec<V>,
    instance_id: Uuid,
    instance_tag: String,
    store: Arc<dyn SessionStore>,
    bus: Arc<dyn MessageBus>,
    durable_sync: bool,
    /// Upcoming container emissions caused by the baseline or by remote pushes.
    pending_skips: AtomicU64,
    active: AtomicBool,
    cancel: CancellationToken,
    counters: Counters,
}

impl<V> fmt::Debug for SyncBinding<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBinding")
            .field("slot", &self.slot)
            .field("instance_id", &self.instance_id)
            .field("shape", &self.codec.shape())
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<V> SyncBinding<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    /// Create a binding. Performs no I/O.
    ///
    /// `durable_sync = false` builds a binding whose `init()` does nothing,
    /// for deployment targets whose background context never goes away.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] if `container` already has a binding.
    pub fn new(
        container: &Reactive<V>,
        slot: Slot,
        codec: ValueCodec<V>,
        store: Arc<dyn SessionStore>,
        bus: Arc<dyn MessageBus>,
        durable_sync: bool,
    ) -> Result<Arc<Self>> {
        if !container.try_bind() {
            return Err(SyncError::Configuration(format!(
                "container for slot {slot} already has a sync binding"
            )));
        }

        let instance_id = Uuid::new_v4();
        let topic = slot.update_topic();
        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            container: container.clone(),
            slot,
            topic,
            codec,
            instance_id,
            instance_tag: instance_id.to_string(),
            store,
            bus,
            durable_sync,
            pending_skips: AtomicU64::new(1),
            active: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            counters: Counters::default(),
        }))
    }

    /// Subscribe to the container and the bus and spawn the event task.
    ///
    /// No-op when durable sync is disabled or the binding is already active.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] when called outside a tokio runtime.
    pub fn init(&self) -> Result<()> {
        if !self.durable_sync {
            debug!(slot = %self.slot, "durable sync disabled, binding stays inactive");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SyncError::Configuration(format!("binding for {} needs a tokio runtime: {e}", self.slot))
        })?;
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Subscribe before spawning so nothing emitted after init() is missed.
        let local = self.container.subscribe();
        let remote = self.bus.subscribe();
        runtime.spawn(Self::run(
            self.this.clone(),
            self.cancel.clone(),
            self.slot.clone(),
            local,
            remote,
        ));
        info!(slot = %self.slot, instance_id = %self.instance_id, "sync binding active");
        Ok(())
    }

    /// Event task. Holds the binding weakly so the owner alone decides
    /// how long it lives.
    async fn run(
        this: Weak<Self>,
        cancel: CancellationToken,
        slot: Slot,
        mut local: Subscription<V>,
        mut remote: broadcast::Receiver<BusMessage>,
    ) {
        let mut bus_open = true;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                value = local.next() => {
                    let (Some(value), Some(binding)) = (value, this.upgrade()) else {
                        break;
                    };
                    binding.handle_local_emission(value).await;
                }
                message = remote.recv(), if bus_open => {
                    let Some(binding) = this.upgrade() else {
                        break;
                    };
                    match message {
                        Ok(message) => {
                            if let Err(e) = binding.handle_message(&message).await {
                                warn!(%slot, "remote update not applied: {e}");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%slot, skipped, "bus subscriber lagged, re-reading slot");
                            if let Err(e) = binding.resync().await {
                                warn!(%slot, "resync after lag failed: {e}");
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!(%slot, "bus closed, remote updates stop");
                            bus_open = false;
                        }
                    }
                }
            }
        }
        debug!(%slot, "sync binding stopped");
    }

    /// Consume one pending skip, if any.
    fn take_skip(&self) -> bool {
        self.pending_skips
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Handle one emission of the local container.
    ///
    /// Write-through failures are logged and counted, never returned: the
    /// container keeps its locally set value either way.
    pub async fn handle_local_emission(&self, value: V) -> LocalOutcome {
        if self.take_skip() {
            Counters::bump(&self.counters.skipped_emissions);
            debug!(slot = %self.slot, "emission skipped");
            return LocalOutcome::Skipped;
        }

        let json = match self.codec.encode(&value) {
            Ok(json) => json,
            Err(e) => return self.write_failed(&e),
        };
        if let Err(e) = self.store.set(self.slot.as_str(), json).await {
            return self.write_failed(&e);
        }

        let notice = BusMessage::new(
            self.topic.clone(),
            json!({ INSTANCE_ID_KEY: self.instance_tag }),
        );
        if let Err(e) = self.bus.send(notice).await {
            return self.write_failed(&e);
        }

        Counters::bump(&self.counters.local_writes);
        debug!(slot = %self.slot, "local value written through");
        LocalOutcome::Written
    }

    fn write_failed(&self, error: &SyncError) -> LocalOutcome {
        Counters::bump(&self.counters.failures);
        warn!(slot = %self.slot, "write-through failed: {error}");
        LocalOutcome::Failed
    }

    /// Handle one bus message.
    ///
    /// # Errors
    ///
    /// Store read failures and [`SyncError::Deserialization`] when the
    /// stored JSON does not fit the codec. The container is left unchanged.
    pub async fn handle_message(&self, message: &BusMessage) -> Result<RemoteOutcome> {
        if message.topic != self.topic {
            return Ok(RemoteOutcome::OtherTopic);
        }
        let sender = message.payload.get(INSTANCE_ID_KEY).and_then(Value::as_str);
        if sender == Some(self.instance_tag.as_str()) {
            Counters::bump(&self.counters.echoes_suppressed);
            return Ok(RemoteOutcome::Echo);
        }
        self.pull().await
    }

    /// Re-read the slot regardless of any announcement.
    ///
    /// Used when the bus reports dropped messages: the store is
    /// authoritative, so one read restores convergence.
    ///
    /// # Errors
    ///
    /// Same as [`SyncBinding::handle_message`].
    pub async fn resync(&self) -> Result<RemoteOutcome> {
        Counters::bump(&self.counters.resyncs);
        self.pull().await
    }

    async fn pull(&self) -> Result<RemoteOutcome> {
        let stored = self
            .store
            .get(self.slot.as_str())
            .await
            .inspect_err(|_| Counters::bump(&self.counters.failures))?;
        let Some(stored) = stored else {
            return Ok(RemoteOutcome::Absent);
        };
        let value = self
            .codec
            .decode(stored)
            .inspect_err(|_| Counters::bump(&self.counters.failures))?;

        self.pending_skips.fetch_add(1, Ordering::SeqCst);
        self.container.set(value);
        Counters::bump(&self.counters.remote_pulls);
        debug!(slot = %self.slot, "remote value applied");
        Ok(RemoteOutcome::Applied)
    }

    /// The bound container.
    pub fn container(&self) -> &Reactive<V> {
        &self.container
    }

    /// Bus topic this binding listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<V> Drop for SyncBinding<V> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.container.release_bind();
        if self.active.load(Ordering::SeqCst) {
            debug!(slot = %self.slot, "sync binding dropped");
        }
    }
}

impl<V> AnyBinding for SyncBinding<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn slot(&self) -> &Slot {
        &self.slot
    }

    fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn shape(&self) -> InitializeAs {
        self.codec.shape()
    }

    fn init(&self) -> Result<()> {
        SyncBinding::init(self)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }
}
