//! Timer dispatch: fire due timers exactly once.
//!
//! A tick walks every [`TimerName`], reads its persisted entry and, for
//! each one that is due, clears it *before* invoking the handler. A
//! recurring timer is moved to its next occurrence instead of cleared; if
//! periods were missed while no context was running it still fires once.
//! A timer whose clear or reschedule fails is left for the next tick rather
//! than fired twice.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::names::TimerName;
use super::registry::{TimerEntry, TimerRegistry};
use crate::error::{Result, SyncError};

/// Action run when a timer fires.
pub type TimerHandler = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// What one dispatch tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Due timers whose handler completed.
    pub fired: Vec<TimerName>,
    /// Due timers whose handler returned an error or panicked.
    pub failed: Vec<TimerName>,
    /// Due timers with no registered handler.
    pub unhandled: Vec<TimerName>,
    /// Scheduled timers not yet due.
    pub pending: Vec<TimerName>,
    /// Due recurring timers moved to their next occurrence.
    pub rescheduled: Vec<TimerName>,
}

impl TickReport {
    /// Whether no timer was due.
    pub fn is_idle(&self) -> bool {
        self.fired.is_empty() && self.failed.is_empty() && self.unhandled.is_empty()
    }
}

/// Fires due timers through registered handlers.
pub struct TimerDispatcher {
    registry: TimerRegistry,
    handlers: RwLock<HashMap<TimerName, TimerHandler>>,
    tick_guard: Mutex<()>,
}

impl std::fmt::Debug for TimerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handled: Vec<TimerName> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        handled.sort();
        f.debug_struct("TimerDispatcher")
            .field("registry", &self.registry)
            .field("handlers", &handled)
            .finish_non_exhaustive()
    }
}

impl TimerDispatcher {
    /// Dispatcher over `registry` with no handlers registered.
    pub fn new(registry: TimerRegistry) -> Self {
        Self {
            registry,
            handlers: RwLock::new(HashMap::new()),
            tick_guard: Mutex::new(()),
        }
    }

    /// Registry this dispatcher reads.
    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    /// Run `handler` whenever `name` fires. Replaces any earlier handler.
    pub fn register_handler<F, Fut>(&self, name: TimerName, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: TimerHandler = Arc::new(move || handler().boxed());
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handler);
        debug!(timer = %name, "timer handler registered");
    }

    /// Forget the handler for `name`. Returns whether one was registered.
    pub fn unregister_handler(&self, name: TimerName) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name)
            .is_some()
    }

    /// Whether a handler is registered for `name`.
    pub fn has_handler(&self, name: TimerName) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name)
    }

    fn handler(&self, name: TimerName) -> Option<TimerHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
    }

    /// Schedule `name` to fire after `delay`. A zero delay clears it.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] if no handler is registered for `name`
    /// in this dispatcher; store errors otherwise.
    pub async fn schedule(&self, name: TimerName, delay: Duration) -> Result<()> {
        if !self.has_handler(name) {
            return Err(SyncError::Configuration(format!(
                "no handler registered for timer {name}, refusing to schedule it"
            )));
        }
        self.registry.set_fire_time(name, delay).await
    }

    /// Fire `name` every `period`, first after `initial_delay` or one period.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] if no handler is registered for `name`
    /// or the period is zero; store errors otherwise.
    pub async fn schedule_interval(
        &self,
        name: TimerName,
        period: Duration,
        initial_delay: Option<Duration>,
    ) -> Result<()> {
        if !self.has_handler(name) {
            return Err(SyncError::Configuration(format!(
                "no handler registered for timer {name}, refusing to schedule it"
            )));
        }
        self.registry.set_interval(name, period, initial_delay).await
    }

    /// Fire every timer that fell due while no dispatcher was running.
    ///
    /// Meant for context startup; it is an ordinary tick with a summary log.
    pub async fn recover(&self) -> TickReport {
        let report = self.tick().await;
        if !report.is_idle() {
            info!(
                fired = report.fired.len(),
                failed = report.failed.len(),
                unhandled = report.unhandled.len(),
                "overdue timers recovered"
            );
        }
        report
    }

    /// Cancel `name`.
    pub async fn clear(&self, name: TimerName) -> Result<()> {
        self.registry.clear(name).await
    }

    /// Fire every timer due at the registry clock's current time.
    pub async fn tick(&self) -> TickReport {
        let now_ms = self.registry.clock().now_ms();
        self.tick_at(now_ms).await
    }

    /// Fire every timer due at `now_ms`.
    ///
    /// Concurrent ticks in one process run one after another.
    pub async fn tick_at(&self, now_ms: u64) -> TickReport {
        let _guard = self.tick_guard.lock().await;
        let mut report = TickReport::default();

        for name in TimerName::ALL {
            let entry = match self.registry.entry(name).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(timer = %name, "cannot read timer: {e}");
                    continue;
                }
            };
            let fire_at = entry.fire_at;
            if fire_at > now_ms {
                report.pending.push(name);
                continue;
            }

            if let Err(e) = self.retire(name, entry, now_ms, &mut report).await {
                warn!(timer = %name, "cannot retire due timer, leaving it for the next tick: {e}");
                continue;
            }

            let Some(handler) = self.handler(name) else {
                warn!(timer = %name, fire_at, "timer fired with no handler registered");
                report.unhandled.push(name);
                continue;
            };

            let run = AssertUnwindSafe(async move { handler().await }).catch_unwind();
            match run.await {
                Ok(Ok(())) => {
                    info!(timer = %name, fire_at, now_ms, "timer fired");
                    report.fired.push(name);
                }
                Ok(Err(e)) => {
                    error!(timer = %name, "timer handler failed: {e:#}");
                    report.failed.push(name);
                }
                Err(panic) => {
                    error!(timer = %name, "timer handler panicked: {}", panic_message(&*panic));
                    report.failed.push(name);
                }
            }
        }

        report
    }

    /// Clear a due one-shot timer or move a recurring one past `now_ms`.
    async fn retire(
        &self,
        name: TimerName,
        entry: TimerEntry,
        now_ms: u64,
        report: &mut TickReport,
    ) -> Result<()> {
        let Some((next, missed)) = entry.next_after(now_ms) else {
            return self.registry.clear(name).await;
        };
        let period_ms = entry.period_ms.unwrap_or_default();
        self.registry
            .set_entry(name, TimerEntry::every(next, period_ms))
            .await?;
        if missed > 0 {
            info!(timer = %name, missed, next, "recurring timer skipped missed periods");
        }
        report.rescheduled.push(name);
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
