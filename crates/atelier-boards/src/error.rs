//! Error types for board operations.

use thiserror::Error;

/// Errors that can occur during board operations.
///
/// Every variant is a local validation failure: the board set is unchanged
/// when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Another board already uses this name (compared case-insensitively).
    #[error("a board named {name:?} already exists")]
    DuplicateName { name: String },

    /// The default board cannot be deleted.
    #[error("board is protected: {id}")]
    ProtectedBoard { id: String },

    /// No board has this id.
    #[error("board not found: {id}")]
    NotFound { id: String },

    /// The board name is invalid.
    #[error("invalid board name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Convenience type alias for board operations.
pub type BoardResult<T> = std::result::Result<T, BoardError>;
