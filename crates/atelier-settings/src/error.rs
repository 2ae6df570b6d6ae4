//! Error types for settings persistence.

/// Errors from settings store operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The document could not be persisted: over quota or the backend is
    /// not usable. The in-memory state stays authoritative.
    #[error("settings storage unavailable: {0}")]
    StorageUnavailable(String),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error reading or writing the settings file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Serialization(e.to_string())
    }
}

/// Result alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
