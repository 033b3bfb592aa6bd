//! Durable session store.
//!
//! A namespaced key → JSON store scoped to one application session: it
//! outlives any individual execution context but is cleared when the whole
//! application restarts. Multi-writer, multi-reader, last write wins, no
//! transactions.
//!
//! # Submodules
//!
//! - [`memory`] — in-process store shared by clones
//! - [`fs`] — one JSON file per key in a session directory

pub mod fs;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;

pub use fs::FsSessionStore;
pub use memory::MemorySessionStore;

/// Async key → JSON storage shared by every execution context.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored at `key`, or `None` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Overwrite the value stored at `key`.
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Build the store selected by `config`.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn SessionStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemorySessionStore::new())),
        StoreBackend::Fs => Ok(Arc::new(FsSessionStore::new(config.effective_dir())?)),
    }
}
