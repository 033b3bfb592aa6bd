//! Persisted timer fire times.
//!
//! Each timer lives in the session store under `"timer:{name}"`:
//!
//! - `null` or absent: unset
//! - a number: one-shot timer firing at that epoch millisecond
//! - `{"fire_at": ms, "period_ms": p}`: recurring timer, next due at
//!   `fire_at` and every `p` milliseconds after
//!
//! Nothing is cached in memory, so a registry rebuilt after a context
//! restart sees exactly what the previous one scheduled.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::names::TimerName;
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::store::SessionStore;

/// One persisted timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEntry {
    /// Epoch milliseconds at which the timer is next due.
    pub fire_at: u64,
    /// Repeat period for recurring timers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_ms: Option<u64>,
}

impl TimerEntry {
    /// One-shot entry.
    pub fn once(fire_at: u64) -> Self {
        Self {
            fire_at,
            period_ms: None,
        }
    }

    /// Recurring entry. A zero period is stored as one-shot.
    pub fn every(fire_at: u64, period_ms: u64) -> Self {
        Self {
            fire_at,
            period_ms: (period_ms > 0).then_some(period_ms),
        }
    }

    /// Whether the timer repeats.
    pub fn is_recurring(&self) -> bool {
        self.period_ms.is_some()
    }

    /// First occurrence strictly after `now_ms`, and how many whole periods
    /// were missed on the way. `None` for one-shot entries.
    ///
    /// An entry due at `now_ms` itself has missed nothing. The result
    /// saturates at `u64::MAX`.
    pub fn next_after(&self, now_ms: u64) -> Option<(u64, u64)> {
        let period = self.period_ms?;
        if self.fire_at > now_ms {
            return Some((self.fire_at, 0));
        }
        let missed = (now_ms - self.fire_at) / period;
        let next = self
            .fire_at
            .saturating_add(missed.saturating_add(1).saturating_mul(period));
        Some((next, missed))
    }

    fn to_json(self) -> Value {
        match self.period_ms {
            None => Value::from(self.fire_at),
            Some(period_ms) => json!({ "fire_at": self.fire_at, "period_ms": period_ms }),
        }
    }

    fn from_json(name: TimerName, value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => match n.as_u64() {
                Some(ms) => Some(Self::once(ms)),
                // Fractional or negative times come from foreign writers.
                None => n
                    .as_f64()
                    .filter(|ms| *ms >= 0.0)
                    .map(|ms| Self::once(ms as u64)),
            },
            Value::Object(_) => match serde_json::from_value::<Self>(value.clone()) {
                Ok(entry) if entry.period_ms != Some(0) => Some(entry),
                _ => {
                    warn!(timer = %name, %value, "ignoring malformed timer entry");
                    None
                }
            },
            other => {
                warn!(timer = %name, value = %other, "ignoring malformed timer entry");
                None
            }
        }
    }
}

/// Read/write access to persisted timer fire times.
#[derive(Debug, Clone)]
pub struct TimerRegistry {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl TimerRegistry {
    /// Registry over `store`, computing fire times from `clock`.
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Clock used to compute fire times.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Stored entry for `name`, or `None` when unset or malformed.
    pub async fn entry(&self, name: TimerName) -> Result<Option<TimerEntry>> {
        let stored = self.store.get(&name.store_key()).await?;
        Ok(stored.and_then(|value| TimerEntry::from_json(name, value)))
    }

    /// Next fire time for `name`, or `None` when unset.
    pub async fn fire_time(&self, name: TimerName) -> Result<Option<u64>> {
        Ok(self.entry(name).await?.map(|entry| entry.fire_at))
    }

    /// Persist `entry` for `name` as is.
    pub async fn set_entry(&self, name: TimerName, entry: TimerEntry) -> Result<()> {
        self.store.set(&name.store_key(), entry.to_json()).await
    }

    /// Schedule `name` to fire `delay` from now. A zero delay clears it.
    pub async fn set_fire_time(&self, name: TimerName, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.clear(name).await;
        }
        let fire_at = self.clock.now_ms().saturating_add(millis(delay));
        self.set_entry(name, TimerEntry::once(fire_at)).await?;
        debug!(timer = %name, fire_at, "timer scheduled");
        Ok(())
    }

    /// Make `name` fire every `period`, first after `initial_delay` (or one
    /// period when `None`).
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] for a period shorter than one
    /// millisecond; store errors otherwise.
    pub async fn set_interval(
        &self,
        name: TimerName,
        period: Duration,
        initial_delay: Option<Duration>,
    ) -> Result<()> {
        let period_ms = millis(period);
        if period_ms == 0 {
            return Err(SyncError::Configuration(format!(
                "timer {name} needs a period of at least one millisecond"
            )));
        }
        let first = initial_delay.map_or(period_ms, millis);
        let fire_at = self.clock.now_ms().saturating_add(first);
        self.set_entry(name, TimerEntry::every(fire_at, period_ms))
            .await?;
        debug!(timer = %name, fire_at, period_ms, "recurring timer scheduled");
        Ok(())
    }

    /// Unset `name`.
    pub async fn clear(&self, name: TimerName) -> Result<()> {
        self.store.set(&name.store_key(), Value::Null).await?;
        debug!(timer = %name, "timer cleared");
        Ok(())
    }

    /// Unset every well-known timer.
    pub async fn clear_all(&self) -> Result<()> {
        for name in TimerName::ALL {
            self.clear(name).await?;
        }
        Ok(())
    }

    /// Fire time of every well-known timer.
    pub async fn snapshot(&self) -> Result<Vec<(TimerName, Option<u64>)>> {
        let mut entries = Vec::with_capacity(TimerName::ALL.len());
        for name in TimerName::ALL {
            entries.push((name, self.fire_time(name).await?));
        }
        Ok(entries)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
