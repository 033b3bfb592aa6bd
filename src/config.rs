//! Configuration types for sync bindings, the session store and timer dispatch.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Top-level configuration for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether this deployment target needs durable cross-context sync.
    ///
    /// Targets whose background context is never torn down can turn this
    /// off; bindings then stay inactive after `init()`.
    pub durable_sync: bool,
    /// Fallback log filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Periodic dispatch trigger settings.
    pub dispatch: DispatchConfig,
    /// Session store settings.
    pub store: StoreConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            durable_sync: true,
            log_level: "info".to_owned(),
            dispatch: DispatchConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Periodic trigger configuration for the timer dispatch loop.
///
/// `triggers` independent triggers each fire once per `period_secs`,
/// staggered evenly across the period. Six triggers over 60 s give a
/// dispatch roughly every 10 s without sub-minute scheduling primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Period of each trigger in seconds.
    pub period_secs: u64,
    /// Number of staggered triggers per period.
    pub triggers: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            period_secs: 60,
            triggers: 6,
        }
    }
}

impl DispatchConfig {
    /// Period of each individual trigger.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Start offsets of each trigger within the period.
    pub fn trigger_offsets(&self) -> Vec<Duration> {
        let triggers = self.triggers.max(1);
        let step = self.period() / triggers;
        (0..triggers).map(|i| step * i).collect()
    }
}

/// Which [`SessionStore`](crate::store::SessionStore) implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store shared by every context in the same process.
    #[default]
    Memory,
    /// One JSON file per key in a session directory.
    Fs,
}

/// Session store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store implementation.
    pub backend: StoreBackend,
    /// Session directory for the `fs` backend (None = platform default).
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Session directory for the `fs` backend.
    pub fn effective_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(crate::app_dirs::session_dir)
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| SyncError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SyncError::Configuration(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Load from the default path, or return defaults when no file exists.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Reject values the dispatch runner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.period_secs == 0 {
            return Err(SyncError::Configuration(
                "dispatch.period_secs must be at least 1".to_owned(),
            ));
        }
        if self.dispatch.triggers == 0 {
            return Err(SyncError::Configuration(
                "dispatch.triggers must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
