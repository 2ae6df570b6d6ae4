//! The board record.

use serde::{Deserialize, Serialize};

use atelier_types::{now_millis, BoardId, ImageId};

/// Display name of the default board.
pub const DEFAULT_BOARD_NAME: &str = "My Creations";

/// Description of the default board.
pub const DEFAULT_BOARD_DESCRIPTION: &str = "All your generated images";

/// A named, ordered collection of image ids.
///
/// `image_ids` keeps insertion order but never holds the same id twice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Unix milliseconds; refreshed on any membership or metadata change.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub image_ids: Vec<ImageId>,
}

impl Board {
    /// A new, empty board stamped with the current time.
    pub fn new(id: BoardId, name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id,
            name: name.into(),
            emoji: None,
            description: None,
            created_at: now,
            updated_at: now,
            image_ids: Vec::new(),
        }
    }

    /// The board every gallery starts with.
    pub fn default_board() -> Self {
        let mut board = Self::new(BoardId::default_board(), DEFAULT_BOARD_NAME);
        board.description = Some(DEFAULT_BOARD_DESCRIPTION.to_string());
        board
    }

    pub fn is_default(&self) -> bool {
        self.id.is_default()
    }

    pub fn contains(&self, image_id: &ImageId) -> bool {
        self.image_ids.contains(image_id)
    }

    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Append `image_id` unless present. Returns `true` if it was added.
    ///
    /// `updated_at` is refreshed either way.
    pub(crate) fn insert_image(&mut self, image_id: &ImageId) -> bool {
        self.touch();
        if self.contains(image_id) {
            return false;
        }
        self.image_ids.push(image_id.clone());
        true
    }

    /// Remove `image_id` if present. Returns `true` if it was removed.
    pub(crate) fn remove_image(&mut self, image_id: &ImageId) -> bool {
        let before = self.image_ids.len();
        self.image_ids.retain(|id| id != image_id);
        let removed = self.image_ids.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Drop duplicate ids, keeping the first occurrence.
    pub(crate) fn dedup_images(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.image_ids.retain(|id| seen.insert(id.clone()));
    }
}
