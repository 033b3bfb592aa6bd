//! In-memory session store.
//!
//! # Examples
//!
//! ```
//! use ctxsync::store::MemorySessionStore;
//!
//! let store = MemorySessionStore::new();
//! let same_session = store.clone();
//! assert!(format!("{same_session:?}").contains("MemorySessionStore"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::Result;

/// In-process session store.
///
/// Entries live in an `Arc<RwLock<HashMap>>`; every clone sees the same
/// session, which is how contexts simulated in one process share state.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemorySessionStore {
    /// Create a new empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry, as a full application restart would.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}
