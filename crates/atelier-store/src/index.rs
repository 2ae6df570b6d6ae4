//! In-memory record table with board and timestamp indexes.
//!
//! [`RecordIndex`] is the shared core of every backend: the in-memory store
//! wraps it directly, the log store rebuilds it on open by replaying the log.

use std::collections::{BTreeSet, HashMap};

use atelier_types::{BoardId, ImageId};

use crate::record::GalleryRecord;

type IndexKey = (i64, ImageId);

/// Records keyed by id, plus non-unique secondary indexes.
#[derive(Clone, Debug, Default)]
pub struct RecordIndex {
    records: HashMap<ImageId, GalleryRecord>,
    /// board id -> (timestamp, id), ordered.
    by_board: HashMap<BoardId, BTreeSet<IndexKey>>,
    /// (timestamp, id) over all records.
    by_time: BTreeSet<IndexKey>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &ImageId) -> Option<&GalleryRecord> {
        self.records.get(id)
    }

    /// Insert or replace a record. Returns the replaced record, if any.
    ///
    /// Index entries of the replaced record are removed first, so a record
    /// that changed boards or timestamp is never listed twice.
    pub fn insert(&mut self, record: GalleryRecord) -> Option<GalleryRecord> {
        let previous = self.remove(&record.id);
        let key = (record.timestamp, record.id.clone());
        self.by_board
            .entry(record.board_id.clone())
            .or_default()
            .insert(key.clone());
        self.by_time.insert(key);
        self.records.insert(record.id.clone(), record);
        previous
    }

    /// Remove a record and its index entries.
    pub fn remove(&mut self, id: &ImageId) -> Option<GalleryRecord> {
        let record = self.records.remove(id)?;
        let key = (record.timestamp, record.id.clone());
        if let Some(entries) = self.by_board.get_mut(&record.board_id) {
            entries.remove(&key);
            if entries.is_empty() {
                self.by_board.remove(&record.board_id);
            }
        }
        self.by_time.remove(&key);
        Some(record)
    }

    /// Records for a board, oldest first.
    pub fn by_board(&self, board: &BoardId) -> Vec<GalleryRecord> {
        self.by_board
            .get(board)
            .map(|keys| {
                keys.iter()
                    .filter_map(|(_, id)| self.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<GalleryRecord> {
        self.by_time
            .iter()
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_board.clear();
        self.by_time.clear();
    }
}
