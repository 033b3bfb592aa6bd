//! Wall-clock sources for timer scheduling.
//!
//! Timer entries store absolute epoch-millisecond targets, so every reader
//! in every context must agree on the clock. [`SystemClock`] is the real
//! thing; [`ManualClock`] lets tests and simulations move time by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current epoch time in milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current epoch time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_epoch_millis()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Current epoch time in milliseconds.
#[must_use]
pub fn now_epoch_millis() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
