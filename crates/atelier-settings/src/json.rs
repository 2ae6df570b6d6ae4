//! JSON file settings backend.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::document::SettingsDocument;
use crate::error::{SettingsError, SettingsResult};
use crate::traits::SettingsStore;

/// File name used inside a data directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Limits applied when writing the settings file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonSettingsConfig {
    /// Generations and edits kept on a normal flush.
    pub history_limit: usize,
    /// Generations and edits kept when the normal flush is over the byte
    /// limit.
    pub history_fallback_limit: usize,
    /// Largest document the backend accepts, in bytes.
    pub max_bytes: usize,
}

impl Default for JsonSettingsConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            history_fallback_limit: 10,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Settings stored as a single JSON file, replaced atomically on flush.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    config: JsonSettingsConfig,
}

impl JsonSettingsStore {
    /// Use the settings file at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>, config: JsonSettingsConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Use `settings.json` inside a data directory.
    pub fn in_dir(dir: &Path, config: JsonSettingsConfig) -> Self {
        Self::new(dir.join(SETTINGS_FILE_NAME), config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize within the byte limit, cutting history if needed.
    fn encode(&self, document: &SettingsDocument) -> SettingsResult<String> {
        let text = document.to_json(Some(self.config.history_limit))?;
        if text.len() <= self.config.max_bytes {
            return Ok(text);
        }

        warn!(
            size = text.len(),
            max = self.config.max_bytes,
            keep = self.config.history_fallback_limit,
            "settings over quota; cutting project history"
        );
        let text = document.to_json(Some(self.config.history_fallback_limit))?;
        if text.len() <= self.config.max_bytes {
            return Ok(text);
        }

        Err(SettingsError::StorageUnavailable(format!(
            "quota exceeded: settings are {} bytes, limit {}",
            text.len(),
            self.config.max_bytes
        )))
    }

    fn write_atomic(&self, text: &str) -> SettingsResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SettingsError::Io(e.error))?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> SettingsResult<SettingsDocument> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let document = SettingsDocument::from_json(&text);
                info!(
                    path = %self.path.display(),
                    boards = document.boards.len(),
                    "settings loaded"
                );
                Ok(document)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no settings file; starting fresh");
                Ok(SettingsDocument::new())
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), "settings file is not UTF-8; starting fresh");
                Ok(SettingsDocument::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&self, document: &SettingsDocument) -> SettingsResult<()> {
        let text = self.encode(document)?;
        self.write_atomic(&text)?;
        debug!(path = %self.path.display(), bytes = text.len(), "settings flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_types::{Generation, ImageId, OutputAsset};

    fn generation(n: usize, payload_len: usize) -> Generation {
        Generation {
            id: format!("gen-{n}"),
            prompt: String::new(),
            output_assets: vec![OutputAsset::new(
                "a",
                format!("data:image/png;base64,{}", "A".repeat(payload_len)),
            )],
            timestamp: n as i64,
            parent_generation_id: None,
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path(), JsonSettingsConfig::default());
        let doc = store.load().unwrap();
        assert_eq!(doc.boards.len(), 1);
        assert!(doc.boards.selected().unwrap().is_default());
        assert!(doc.project.is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_loads_single_default_board() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path(), JsonSettingsConfig::default());
        fs::write(store.path(), "{\"boards\": \"definitely not boards\"").unwrap();
        let doc = store.load().unwrap();
        assert_eq!(doc.boards.len(), 1);
        assert!(doc.boards.boards()[0].is_default());
        assert!(doc.boards.boards()[0].is_empty());
    }

    #[test]
    fn flush_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(&dir.path().join("nested"), JsonSettingsConfig::default());

        let mut doc = SettingsDocument::new();
        let board = doc.boards.create_board("Sketches", None, None).unwrap();
        doc.boards.add_image(&board.id, &ImageId::new("img-1-a")).unwrap();
        store.flush(&doc).unwrap();

        assert_eq!(store.load().unwrap(), doc);
    }

    #[test]
    fn flush_truncates_to_history_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path(), JsonSettingsConfig::default());
        let mut doc = SettingsDocument::new();
        for n in 0..30 {
            doc.project_mut().push_generation(generation(n, 4));
        }
        store.flush(&doc).unwrap();

        let loaded = store.load().unwrap().project.unwrap();
        assert_eq!(loaded.generations.len(), 20);
        assert_eq!(loaded.generations[19].id, "gen-29");
    }

    #[test]
    fn over_quota_falls_back_to_shorter_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = SettingsDocument::new();
        for n in 0..20 {
            doc.project_mut().push_generation(generation(n, 1000));
        }
        // Room for about 15 generations: 20 does not fit, 10 does.
        let config = JsonSettingsConfig {
            max_bytes: 15_000,
            ..JsonSettingsConfig::default()
        };
        let store = JsonSettingsStore::in_dir(dir.path(), config);
        store.flush(&doc).unwrap();

        let loaded = store.load().unwrap().project.unwrap();
        assert_eq!(loaded.generations.len(), 10);
        assert_eq!(loaded.generations[0].id, "gen-10");
    }

    #[test]
    fn hopeless_quota_is_unavailable_and_keeps_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonSettingsConfig {
            max_bytes: 400,
            ..JsonSettingsConfig::default()
        };
        let store = JsonSettingsStore::in_dir(dir.path(), config);
        let mut doc = SettingsDocument::new();
        store.flush(&doc).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        for n in 0..20 {
            doc.project_mut().push_generation(generation(n, 1000));
        }
        let err = store.flush(&doc).unwrap_err();
        assert!(matches!(err, SettingsError::StorageUnavailable(_)));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }
}
