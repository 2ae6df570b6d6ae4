/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be used right now: closed, over quota, or the
    /// backend is not usable. The operation did not happen.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the caller should fall back to session-only storage.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_) | StoreError::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
