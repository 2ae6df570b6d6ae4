use crate::document::SettingsDocument;
use crate::error::SettingsResult;

/// Storage backend for the settings document.
///
/// All implementations must satisfy these invariants:
/// - `load` is eager and never fails on damaged content; it falls back to
///   defaults as described in [`SettingsDocument::from_json`]. It fails only
///   when the backend itself cannot be read.
/// - `flush` replaces the whole document atomically: a reader sees either
///   the previous or the new document, never a mix.
/// - A failed `flush` leaves the previously persisted document in place.
pub trait SettingsStore: Send + Sync {
    /// Read the persisted document, or the first-run document if none exists.
    fn load(&self) -> SettingsResult<SettingsDocument>;

    /// Persist a document, replacing the previous one.
    fn flush(&self, document: &SettingsDocument) -> SettingsResult<()>;
}
