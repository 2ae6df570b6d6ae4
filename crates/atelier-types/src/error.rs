use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}
