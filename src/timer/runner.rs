//! Periodic trigger loop driving [`TimerDispatcher::tick`].
//!
//! The runner spawns one tokio interval per trigger, all with the same
//! period but staggered start offsets, so a period of 60 s with six
//! triggers gives a dispatch tick roughly every 10 s. The first trigger
//! ticks immediately, which fires whatever fell due while the context was
//! gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::dispatch::TimerDispatcher;
use crate::config::DispatchConfig;

/// Background runner for a [`TimerDispatcher`].
#[derive(Debug)]
pub struct DispatchRunner {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl DispatchRunner {
    /// Spawn the trigger loops on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(dispatcher: Arc<TimerDispatcher>, config: &DispatchConfig) -> Self {
        Self::spawn_with(dispatcher, config.period(), config.trigger_offsets())
    }

    /// Spawn one trigger per entry of `offsets`, each firing every `period`.
    pub fn spawn_with(
        dispatcher: Arc<TimerDispatcher>,
        period: Duration,
        offsets: Vec<Duration>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let period = period.max(Duration::from_millis(1));
        let start = Instant::now();
        info!(
            triggers = offsets.len(),
            period_ms = period.as_millis() as u64,
            "timer dispatch runner started"
        );

        let handles = offsets
            .into_iter()
            .enumerate()
            .map(|(trigger, offset)| {
                let dispatcher = Arc::clone(&dispatcher);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval_at(start + offset, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    let mut startup = trigger == 0;
                    loop {
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            _ = interval.tick() => {
                                let report = if std::mem::take(&mut startup) {
                                    dispatcher.recover().await
                                } else {
                                    dispatcher.tick().await
                                };
                                if !report.is_idle() {
                                    debug!(trigger, ?report, "dispatch tick");
                                }
                            }
                        }
                    }
                    debug!(trigger, "dispatch trigger stopped");
                })
            })
            .collect();

        Self { cancel, handles }
    }

    /// Token that stops every trigger when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of trigger loops.
    pub fn trigger_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop all triggers and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.await;
        }
        info!("timer dispatch runner stopped");
    }
}

impl Drop for DispatchRunner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
