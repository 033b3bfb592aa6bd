//! Error types for cross-context sync and persisted timers.

/// Top-level error type for the sync subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid wiring detected at construction or registration time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Stored JSON did not match the shape a codec expects.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A live value could not be turned into JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Session store read or write failure.
    #[error("store error: {0}")]
    Store(String),

    /// Broadcast channel send failure.
    #[error("bus error: {0}")]
    Bus(String),

    /// Timer action handler failure.
    #[error("handler error: {0}")]
    Handler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns `true` for errors that must abort owner construction.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SyncError>;
