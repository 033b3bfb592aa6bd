//! ctxsync: reactive state sync and durable timers across execution contexts.
//!
//! An application split into isolated contexts (a background context that
//! may be torn down at any time, foreground popups, page scripts) shares
//! two things per session: a durable key → JSON store and a broadcast bus.
//! This crate builds on those two to provide:
//!
//! - **Field sync**: owners declare reactive fields with [`sync::SyncRegistry`];
//!   local changes are written through to the store and announced, peers
//!   pull the stored value on announcement, and a context recreated later
//!   keeps working from the store.
//! - **Durable timers**: [`timer::TimerRegistry`] persists named one-shot and recurring fire times
//!   in the store so a restarted background context still fires them, and
//!   [`timer::TimerDispatcher`] fires each due timer at most once.
//!
//! # Architecture
//!
//! ```text
//!  Reactive<T> ──▶ SyncBinding ──▶ SessionStore ◀── TimerRegistry ◀── TimerDispatcher
//!                       │  ▲                                              ▲
//!                       ▼  │                                              │
//!                    MessageBus                                    DispatchRunner
//! ```

pub mod app_dirs;
pub mod bus;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod reactive;
pub mod store;
pub mod sync;
pub mod timer;

pub use bus::{BusMessage, LocalBus, MessageBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use context::{ContextKind, ExecutionContext};
pub use error::{Result, SyncError};
pub use reactive::{Reactive, Subscription};
pub use store::{FsSessionStore, MemorySessionStore, SessionStore};
pub use sync::{SyncOptions, SyncRegistration, SyncRegistry, SyncedField};
pub use timer::{
    DispatchRunner, TickReport, TimerDispatcher, TimerEntry, TimerName, TimerRegistry,
};
