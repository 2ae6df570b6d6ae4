use serde::{Deserialize, Serialize};

use atelier_types::{now_millis, BoardId, ImageId};

/// The durable record of one saved image.
///
/// One record exists per opaque image id. Records are never mutated except
/// for metadata refresh; saving again under the same id replaces the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryRecord {
    pub id: ImageId,
    /// Renderable reference: a data URL for saved bytes, or the reference
    /// the caller supplied.
    pub reference: String,
    pub board_id: BoardId,
    pub board_name: String,
    /// Save time in Unix milliseconds.
    pub timestamp: i64,
    /// Where the disk mirror wrote a copy, if it did. Informational only.
    /// Always serialized: the log codec is positional.
    #[serde(default)]
    pub disk_path: Option<String>,
}

impl GalleryRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        id: ImageId,
        reference: impl Into<String>,
        board_id: BoardId,
        board_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            reference: reference.into(),
            board_id,
            board_name: board_name.into(),
            timestamp: now_millis(),
            disk_path: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_disk_path(mut self, path: impl Into<String>) -> Self {
        self.disk_path = Some(path.into());
        self
    }
}
