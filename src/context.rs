//! Execution contexts.
//!
//! A context is one isolated runtime of the application (the long-lived
//! background, a popup, a page). Contexts of the same session share the
//! session store and the message bus; nothing else.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::bus::MessageBus;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::store::SessionStore;
use crate::sync::SyncRegistry;
use crate::timer::{DispatchRunner, TimerDispatcher, TimerRegistry};

/// Which kind of runtime a context is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Hosts timers and background work; may be torn down and recreated.
    Background,
    /// User-facing popup or side panel.
    Foreground,
    /// Script running inside a page.
    Page,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => f.write_str("background"),
            Self::Foreground => f.write_str("foreground"),
            Self::Page => f.write_str("page"),
        }
    }
}

/// Shared dependencies handed to everything a context constructs.
#[derive(Clone)]
pub struct ExecutionContext {
    kind: ContextKind,
    store: Arc<dyn SessionStore>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("kind", &self.kind)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("durable_sync", &self.config.durable_sync)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Context over a session's store and bus, using the system clock.
    pub fn new(
        kind: ContextKind,
        store: Arc<dyn SessionStore>,
        bus: Arc<dyn MessageBus>,
        config: SyncConfig,
    ) -> Self {
        info!(%kind, durable_sync = config.durable_sync, "execution context created");
        Self {
            kind,
            store,
            bus,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock used for timers.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Kind of runtime.
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Session store shared with the other contexts.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// Bus shared with the other contexts.
    pub fn bus(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.bus)
    }

    /// Clock used for timers.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Whether durable sync is enabled.
    pub fn durable_sync(&self) -> bool {
        self.config.durable_sync
    }

    /// Effective configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start a field registration for `owner` wired to this context.
    pub fn sync_registry(&self, owner: impl Into<String>) -> SyncRegistry {
        SyncRegistry::from_context(owner, self)
    }

    /// Timer registry over this context's store and clock.
    pub fn timer_registry(&self) -> TimerRegistry {
        TimerRegistry::new(self.store(), self.clock())
    }

    /// Fresh dispatcher with no handlers registered.
    pub fn timer_dispatcher(&self) -> Arc<TimerDispatcher> {
        Arc::new(TimerDispatcher::new(self.timer_registry()))
    }

    /// Start the periodic dispatch triggers configured for this context.
    pub fn spawn_dispatch_runner(&self, dispatcher: Arc<TimerDispatcher>) -> DispatchRunner {
        DispatchRunner::spawn(dispatcher, &self.config.dispatch)
    }
}
