use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use atelier_types::{BoardId, ImageId};

use crate::error::{StoreError, StoreResult};
use crate::index::RecordIndex;
use crate::record::GalleryRecord;
use crate::traits::ObjectStore;

struct MemoryState {
    index: RecordIndex,
    closed: bool,
}

/// In-memory object store.
///
/// Intended for tests and for the session-only fallback used when durable
/// storage is unavailable. Data is lost when the store is dropped.
pub struct InMemoryObjectStore {
    state: RwLock<MemoryState>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                index: RecordIndex::new(),
                closed: false,
            }),
        }
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.state.read().expect("lock poisoned").index.is_empty()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.state.write().expect("lock poisoned").index.clear();
    }

    fn read<T>(&self, f: impl FnOnce(&RecordIndex) -> T) -> StoreResult<T> {
        let state = self.state.read().expect("lock poisoned");
        if state.closed {
            return Err(StoreError::StorageUnavailable("store is closed".into()));
        }
        Ok(f(&state.index))
    }

    fn write<T>(&self, f: impl FnOnce(&mut RecordIndex) -> T) -> StoreResult<T> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.closed {
            return Err(StoreError::StorageUnavailable("store is closed".into()));
        }
        Ok(f(&mut state.index))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, record: &GalleryRecord) -> StoreResult<()> {
        self.write(|index| index.insert(record.clone()))?;
        debug!(id = %record.id, board = %record.board_id, "memory store put");
        Ok(())
    }

    async fn get_by_id(&self, id: &ImageId) -> StoreResult<Option<GalleryRecord>> {
        self.read(|index| index.get(id).cloned())
    }

    async fn get_by_board(&self, board: &BoardId) -> StoreResult<Vec<GalleryRecord>> {
        self.read(|index| index.by_board(board))
    }

    async fn get_all(&self) -> StoreResult<Vec<GalleryRecord>> {
        self.read(|index| index.all())
    }

    async fn delete(&self, id: &ImageId) -> StoreResult<bool> {
        self.write(|index| index.remove(id).is_some())
    }

    async fn len(&self) -> StoreResult<usize> {
        self.read(|index| index.len())
    }

    async fn close(&self) -> StoreResult<()> {
        self.state.write().expect("lock poisoned").closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryObjectStore")
            .field("record_count", &state.index.len())
            .field("closed", &state.closed)
            .finish()
    }
}
