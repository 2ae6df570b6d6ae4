use async_trait::async_trait;

use atelier_types::{BoardId, ImageId};

use crate::error::StoreResult;
use crate::record::GalleryRecord;

/// Keyed store of gallery records.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces any record with the same id and keeps the board and
///   timestamp indexes consistent with the latest version.
/// - Each `put` and `delete` is atomic per record. Writes for different ids
///   never corrupt each other's index entries.
/// - On error the operation did not happen; no partial write is visible.
/// - Concurrent reads are always safe.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Insert or replace a record by id.
    async fn put(&self, record: &GalleryRecord) -> StoreResult<()>;

    /// Read a record by id.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    async fn get_by_id(&self, id: &ImageId) -> StoreResult<Option<GalleryRecord>>;

    /// All records saved to a board, in index order (oldest first).
    async fn get_by_board(&self, board: &BoardId) -> StoreResult<Vec<GalleryRecord>>;

    /// Every record, oldest first.
    async fn get_all(&self) -> StoreResult<Vec<GalleryRecord>>;

    /// Delete a record. Returns `true` if it existed; deleting a missing id
    /// is a no-op.
    async fn delete(&self, id: &ImageId) -> StoreResult<bool>;

    /// Number of stored records.
    async fn len(&self) -> StoreResult<usize>;

    /// Release the backend. Every later operation fails with
    /// `StorageUnavailable`.
    async fn close(&self) -> StoreResult<()>;

    /// Check whether a record exists.
    async fn exists(&self, id: &ImageId) -> StoreResult<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }
}
