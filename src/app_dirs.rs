//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/ctxsync/` | `~/.config/ctxsync/` |
//! | Session | `~/Library/Caches/ctxsync/session/` | `~/.cache/ctxsync/session/` |
//!
//! Overrides: `CTXSYNC_CONFIG_DIR` for [`config_dir`], `CTXSYNC_SESSION_DIR`
//! for [`session_dir`].

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CTXSYNC_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("ctxsync"))
        .unwrap_or_else(|| PathBuf::from("/tmp/ctxsync-config"))
}

/// Directory backing the file session store.
///
/// Lives under the cache directory: its contents only need to outlive
/// individual contexts, not the application session.
#[must_use]
pub fn session_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CTXSYNC_SESSION_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("ctxsync").join("session"))
        .unwrap_or_else(|| PathBuf::from("/tmp/ctxsync-session"))
}

/// Path to `config.toml` inside [`config_dir`].
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
