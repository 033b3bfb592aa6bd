//! Named deferred timers that survive context restarts.
//!
//! One-shot and recurring fire times are persisted in the session store by
//! [`TimerRegistry`];
//! [`TimerDispatcher`] fires the due ones through registered handlers and
//! [`DispatchRunner`] calls it on a staggered periodic schedule.

pub mod dispatch;
pub mod names;
pub mod registry;
pub mod runner;

pub use dispatch::{TickReport, TimerDispatcher, TimerHandler};
pub use names::{TIMER_KEY_PREFIX, TimerName};
pub use registry::{TimerEntry, TimerRegistry};
pub use runner::DispatchRunner;
