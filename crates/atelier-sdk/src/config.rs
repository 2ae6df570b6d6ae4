use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use atelier_settings::{JsonSettingsConfig, SETTINGS_FILE_NAME};
use atelier_store::log::LOG_FILE_NAME;
use atelier_store::LogStoreConfig;

use crate::error::{GalleryError, GalleryResult};

/// Gallery configuration. Every field has a default, so an empty TOML file
/// is a valid configuration.
///
/// ```toml
/// data_dir = "/home/me/.atelier"
/// mirror_dir = "/home/me/Pictures/Atelier"
/// history_limit = 20
/// max_log_bytes = 1073741824
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    /// Holds `gallery.log` and `settings.json`.
    pub data_dir: PathBuf,
    /// Keep nothing on disk. Set by [`AtelierConfig::in_memory`].
    pub in_memory: bool,
    /// When set, saved inline images are also written here, one folder per
    /// board.
    pub mirror_dir: Option<PathBuf>,
    /// Generations and edits kept in the settings file.
    pub history_limit: usize,
    /// Generations and edits kept when the settings file is over
    /// `max_settings_bytes`.
    pub history_fallback_limit: usize,
    pub max_settings_bytes: usize,
    /// Byte quota for the record log. Unlimited when absent.
    pub max_log_bytes: Option<u64>,
    /// `fsync` the record log after every write.
    pub sync_writes: bool,
    /// Write settings on tokio's blocking pool instead of inline.
    pub background_flush: bool,
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".atelier"),
            in_memory: false,
            mirror_dir: None,
            history_limit: 20,
            history_fallback_limit: 10,
            max_settings_bytes: 5 * 1024 * 1024,
            max_log_bytes: None,
            sync_writes: false,
            background_flush: true,
        }
    }
}

impl AtelierConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// A configuration that touches no filesystem.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            background_flush: false,
            ..Self::default()
        }
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> GalleryResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GalleryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> GalleryResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| GalleryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> GalleryResult<()> {
        if self.history_fallback_limit > self.history_limit {
            return Err(GalleryError::Config(format!(
                "history_fallback_limit ({}) exceeds history_limit ({})",
                self.history_fallback_limit, self.history_limit
            )));
        }
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn log_store_config(&self) -> LogStoreConfig {
        LogStoreConfig {
            max_log_bytes: self.max_log_bytes,
            sync_every_write: self.sync_writes,
        }
    }

    pub fn settings_config(&self) -> JsonSettingsConfig {
        JsonSettingsConfig {
            history_limit: self.history_limit,
            history_fallback_limit: self.history_fallback_limit,
            max_bytes: self.max_settings_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = AtelierConfig::default();
        assert_eq!(c.data_dir, PathBuf::from(".atelier"));
        assert_eq!(c.history_limit, 20);
        assert_eq!(c.history_fallback_limit, 10);
        assert_eq!(c.max_settings_bytes, 5 * 1024 * 1024);
        assert!(c.max_log_bytes.is_none());
        assert!(c.background_flush);
        assert!(!c.in_memory);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(AtelierConfig::from_toml("").unwrap(), AtelierConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let c = AtelierConfig::from_toml(
            r#"
            data_dir = "/tmp/atelier"
            mirror_dir = "/tmp/pictures"
            max_log_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(c.log_path(), PathBuf::from("/tmp/atelier/gallery.log"));
        assert_eq!(c.settings_path(), PathBuf::from("/tmp/atelier/settings.json"));
        assert_eq!(c.mirror_dir, Some(PathBuf::from("/tmp/pictures")));
        assert_eq!(c.log_store_config().max_log_bytes, Some(1024));
        assert_eq!(c.history_limit, 20);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            AtelierConfig::from_toml("history_limit = \"lots\""),
            Err(GalleryError::Config(_))
        ));
        assert!(matches!(
            AtelierConfig::from_toml("history_limit = 5"),
            Err(GalleryError::Config(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AtelierConfig::load(&dir.path().join("nope.toml")).is_err());
    }
}
