//! Crash-recoverable, append-only record log.
//!
//! Every mutation is one frame:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized LogOp)]
//! ```
//!
//! On open the log is replayed front-to-back into a [`RecordIndex`]. A frame
//! whose CRC does not match is skipped, as is a zeroed header with data after
//! it; a frame that runs past the end of the file, or a zeroed tail, is a torn
//! write from a crash and is cut off. Because a record only
//! becomes visible once its whole frame is on disk, each `put`/`delete` is
//! atomic per record.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use atelier_types::{BoardId, ImageId};

use crate::error::{StoreError, StoreResult};
use crate::index::RecordIndex;
use crate::record::GalleryRecord;
use crate::traits::ObjectStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// File name used inside a data directory.
pub const LOG_FILE_NAME: &str = "gallery.log";

#[derive(Clone, Debug, Serialize, Deserialize)]
enum LogOp {
    Put(GalleryRecord),
    Delete(ImageId),
}

/// Configuration for the record log.
#[derive(Clone, Debug, Default)]
pub struct LogStoreConfig {
    /// Upper bound on the log file size. A `put` that would exceed it fails
    /// with `StorageUnavailable` after one compaction attempt.
    pub max_log_bytes: Option<u64>,
    /// `fsync` after every frame.
    pub sync_every_write: bool,
}

struct LogState {
    /// `None` once the store is closed.
    file: Option<File>,
    /// Length of the valid prefix of the log.
    offset: u64,
    index: RecordIndex,
}

/// Durable object store backed by a single append-only log file.
pub struct LogObjectStore {
    path: PathBuf,
    config: LogStoreConfig,
    state: Mutex<LogState>,
}

fn encode(op: &LogOp) -> StoreResult<Vec<u8>> {
    bincode::serialize(op).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn open_append(path: &Path) -> StoreResult<File> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?)
}

/// Replay the log, returning the rebuilt index and the length of the valid
/// prefix.
fn replay(data: &[u8]) -> (RecordIndex, u64) {
    let mut index = RecordIndex::new();
    let mut offset = 0usize;
    let mut applied = 0usize;

    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 {
            // A zeroed region reaching the end of the file is an unwritten
            // tail; anything after it means one damaged header.
            if data[offset..].iter().all(|b| *b == 0) {
                warn!(offset, file_len = data.len(), "zeroed log tail; stopping replay");
                break;
            }
            warn!(offset, "empty log frame; skipping header");
            offset += HEADER_SIZE;
            continue;
        }

        if offset + HEADER_SIZE + length > data.len() {
            warn!(offset, length, file_len = data.len(), "torn log frame; stopping replay");
            break;
        }

        let payload = &data[offset + HEADER_SIZE..offset + HEADER_SIZE + length];
        let actual_crc = crc32fast::hash(payload);
        offset += HEADER_SIZE + length;

        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping frame");
            continue;
        }

        match bincode::deserialize::<LogOp>(payload) {
            Ok(LogOp::Put(record)) => {
                index.insert(record);
                applied += 1;
            }
            Ok(LogOp::Delete(id)) => {
                index.remove(&id);
                applied += 1;
            }
            Err(e) => warn!(offset, error = %e, "undecodable log frame; skipping"),
        }
    }

    if offset + HEADER_SIZE > data.len() && offset < data.len() {
        warn!(offset, file_len = data.len(), "truncated log header; stopping replay");
    }

    debug!(applied, records = index.len(), "log replay complete");
    (index, offset as u64)
}

impl LogObjectStore {
    /// Open (or create) a record log at `path` and replay it.
    pub fn open(path: &Path, config: LogStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(path)?;
        let data = fs::read(path)?;
        let (index, valid_len) = replay(&data);

        if valid_len < data.len() as u64 {
            warn!(
                valid_len,
                file_len = data.len(),
                "cutting torn tail off record log"
            );
            file.set_len(valid_len)?;
        }

        info!(path = %path.display(), records = index.len(), "record log opened");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(LogState {
                file: Some(file),
                offset: valid_len,
                index,
            }),
        })
    }

    /// Open the log file inside a data directory.
    pub fn open_in_dir(dir: &Path, config: LogStoreConfig) -> StoreResult<Self> {
        Self::open(&dir.join(LOG_FILE_NAME), config)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the valid log, in bytes.
    pub fn log_size(&self) -> u64 {
        self.state.lock().expect("log mutex poisoned").offset
    }

    /// Rewrite the log so it contains exactly one frame per live record.
    ///
    /// The new log is written to a temporary file in the same directory and
    /// renamed over the old one, so a crash leaves either the old or the new
    /// log intact.
    pub fn compact(&self) -> StoreResult<u64> {
        let mut state = self.state.lock().expect("log mutex poisoned");
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut LogState) -> StoreResult<u64> {
        if state.file.is_none() {
            return Err(StoreError::StorageUnavailable("store is closed".into()));
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        let mut written = 0u64;
        for record in state.index.all() {
            let framed = frame(&encode(&LogOp::Put(record))?);
            tmp.write_all(&framed)?;
            written += framed.len() as u64;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        let before = state.offset;
        state.file = Some(open_append(&self.path)?);
        state.offset = written;

        info!(before, after = written, records = state.index.len(), "record log compacted");
        Ok(written)
    }

    /// Append one frame. On failure the file is cut back to the last
    /// complete frame and the index is left untouched.
    fn append_locked(&self, state: &mut LogState, payload: &[u8]) -> StoreResult<()> {
        let offset = state.offset;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StoreError::StorageUnavailable("store is closed".into()))?;

        let framed = frame(payload);
        let result = file.write_all(&framed).and_then(|_| {
            if self.config.sync_every_write {
                file.sync_data()
            } else {
                Ok(())
            }
        });

        if let Err(e) = result {
            warn!(offset, error = %e, "log append failed; rolling back");
            if let Err(rollback) = file.set_len(offset) {
                warn!(offset, error = %rollback, "log rollback failed");
            }
            return Err(e.into());
        }

        state.offset += framed.len() as u64;
        debug!(offset, len = payload.len(), "log append");
        Ok(())
    }

    fn put_sync(&self, record: &GalleryRecord) -> StoreResult<()> {
        let payload = encode(&LogOp::Put(record.clone()))?;
        let frame_len = (HEADER_SIZE + payload.len()) as u64;
        let mut state = self.state.lock().expect("log mutex poisoned");

        if let Some(max) = self.config.max_log_bytes {
            if state.offset + frame_len > max {
                self.compact_locked(&mut state)?;
            }
            if state.offset + frame_len > max {
                warn!(
                    id = %record.id,
                    log_size = state.offset,
                    frame_len,
                    max,
                    "record log quota exceeded"
                );
                return Err(StoreError::StorageUnavailable(format!(
                    "quota exceeded: log is {} bytes, limit {max}",
                    state.offset
                )));
            }
        }

        self.append_locked(&mut state, &payload)?;
        state.index.insert(record.clone());
        Ok(())
    }

    fn delete_sync(&self, id: &ImageId) -> StoreResult<bool> {
        let mut state = self.state.lock().expect("log mutex poisoned");
        if state.file.is_none() {
            return Err(StoreError::StorageUnavailable("store is closed".into()));
        }
        if !state.index.contains(id) {
            return Ok(false);
        }
        let payload = encode(&LogOp::Delete(id.clone()))?;
        self.append_locked(&mut state, &payload)?;
        state.index.remove(id);
        Ok(true)
    }

    fn read<T>(&self, f: impl FnOnce(&RecordIndex) -> T) -> StoreResult<T> {
        let state = self.state.lock().expect("log mutex poisoned");
        if state.file.is_none() {
            return Err(StoreError::StorageUnavailable("store is closed".into()));
        }
        Ok(f(&state.index))
    }
}

#[async_trait]
impl ObjectStore for LogObjectStore {
    async fn put(&self, record: &GalleryRecord) -> StoreResult<()> {
        self.put_sync(record)
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
        self.delete_sync(id)
    }

    async fn len(&self) -> StoreResult<usize> {
        self.read(|index| index.len())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.state.lock().expect("log mutex poisoned");
        if let Some(file) = state.file.take() {
            file.sync_all()?;
            info!(path = %self.path.display(), "record log closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for LogObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("log mutex poisoned");
        f.debug_struct("LogObjectStore")
            .field("path", &self.path)
            .field("records", &state.index.len())
            .field("log_size", &state.offset)
            .finish()
    }
}
