//! Board name validation.
//!
//! Valid board names:
//! - Are trimmed of surrounding whitespace before any other check
//! - Must be non-empty after trimming
//! - Must be at most [`MAX_NAME_CHARS`] characters
//! - Must not contain control characters
//!
//! Uniqueness is checked by [`BoardSet`](crate::BoardSet), using
//! [`names_collide`].

use crate::error::{BoardError, BoardResult};

/// Maximum length of a board name, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Validate a board name, returning the trimmed form.
///
/// # Examples
///
/// ```
/// use atelier_boards::names::normalize_name;
///
/// assert_eq!(normalize_name("  Sketches ").unwrap(), "Sketches");
/// assert!(normalize_name("   ").is_err());
/// ```
pub fn normalize_name(name: &str) -> BoardResult<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(BoardError::InvalidName {
            name: name.to_string(),
            reason: "board name must not be empty".into(),
        });
    }

    let chars = trimmed.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(BoardError::InvalidName {
            name: name.to_string(),
            reason: format!("board name is {chars} characters, limit {MAX_NAME_CHARS}"),
        });
    }

    if let Some(ch) = trimmed.chars().find(|c| c.is_control()) {
        return Err(BoardError::InvalidName {
            name: name.to_string(),
            reason: format!("contains control character: {ch:?}"),
        });
    }

    Ok(trimmed.to_string())
}

/// Returns `true` if two board names would be considered the same name.
pub fn names_collide(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
