//! Filesystem-backed session store.
//!
//! Each key is stored as `{dir}/{key}.json`. Writes are atomic (temp file
//! + rename) so a context killed mid-write never leaves a torn value for
//! the next reader.
//!
//! # Examples
//!
//! ```no_run
//! use ctxsync::store::FsSessionStore;
//!
//! let store = FsSessionStore::new("/tmp/ctxsync-session").unwrap();
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::SessionStore;
use crate::error::{Result, SyncError};

/// Filesystem-backed session store.
#[derive(Debug, Clone)]
pub struct FsSessionStore {
    dir: PathBuf,
}

impl FsSessionStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            SyncError::Store(format!(
                "failed to create session directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    /// Returns the session directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    /// Delete every entry, as a full application restart would.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            SyncError::Store(format!(
                "failed to read session directory {}: {e}",
                self.dir.display()
            ))
        })?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

/// Map a store key onto a safe file stem.
///
/// ASCII alphanumerics, `_` and `-` pass through; every other byte is
/// written as `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Store(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::Store(format!("failed to parse {}: {e}", path.display())))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.entry_path(key);
        let json = serde_json::to_vec(&value)
            .map_err(|e| SyncError::Store(format!("failed to serialize {key}: {e}")))?;

        // Unique temp name: several contexts may write the same key at once.
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            SyncError::Store(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            SyncError::Store(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })?;
        Ok(())
    }
}
