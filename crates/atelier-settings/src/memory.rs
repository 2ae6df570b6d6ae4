//! In-memory settings store for testing and degraded mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::document::SettingsDocument;
use crate::error::{SettingsError, SettingsResult};
use crate::traits::SettingsStore;

/// Settings kept only for the life of the process.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    document: RwLock<Option<SettingsDocument>>,
    flushes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_document(document: SettingsDocument) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            ..Self::default()
        }
    }

    /// Make every later flush fail with `StorageUnavailable`, as a full or
    /// broken backend would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// The most recently flushed document.
    pub fn last_flushed(&self) -> Option<SettingsDocument> {
        self.document.read().expect("lock poisoned").clone()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self) -> SettingsResult<SettingsDocument> {
        Ok(self.last_flushed().unwrap_or_default())
    }

    fn flush(&self, document: &SettingsDocument) -> SettingsResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SettingsError::StorageUnavailable(
                "in-memory settings marked unavailable".into(),
            ));
        }
        *self.document.write().expect("lock poisoned") = Some(document.clone());
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_before_flush_is_first_run() {
        let store = InMemorySettingsStore::new();
        assert_eq!(store.load().unwrap().boards.len(), 1);
        assert_eq!(store.flush_count(), 0);
    }

    #[test]
    fn flush_replaces_document() {
        let store = InMemorySettingsStore::new();
        let mut doc = SettingsDocument::new();
        doc.boards.create_board("Sketches", None, None).unwrap();
        store.flush(&doc).unwrap();
        assert_eq!(store.load().unwrap(), doc);
        assert_eq!(store.flush_count(), 1);
    }

    #[test]
    fn unavailable_flush_keeps_previous() {
        let store = InMemorySettingsStore::with_document(SettingsDocument::new());
        store.set_unavailable(true);
        let mut doc = SettingsDocument::new();
        doc.boards.create_board("Sketches", None, None).unwrap();
        assert!(matches!(store.flush(&doc), Err(SettingsError::StorageUnavailable(_))));
        assert_eq!(store.load().unwrap().boards.len(), 1);
    }
}
