use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::model::{AppConfig, ConfigPatch};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent store for the [`AppConfig`] document.
///
/// The document is cached after the first read; updates merge a
/// [`ConfigPatch`] into the cached copy and persist atomically by writing a
/// sibling temp file and renaming it over the target.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cached: Mutex<Option<AppConfig>>,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document. Reads from disk once; a malformed persisted
    /// document is discarded and replaced with defaults.
    pub fn load(&self) -> AppConfig {
        let mut cached = self.cached.lock().expect("config cache lock");
        if let Some(config) = cached.as_ref() {
            return config.clone();
        }

        let config = match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<AppConfig>(&raw) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "discarding malformed config, using defaults");
                    let defaults = AppConfig::default();
                    if let Err(err) = self.persist(&defaults) {
                        warn!(%err, "failed to persist default config");
                    }
                    defaults
                }
            },
            Err(_) => {
                let defaults = AppConfig::default();
                if let Err(err) = self.persist(&defaults) {
                    warn!(%err, "failed to persist default config");
                }
                defaults
            }
        };

        *cached = Some(config.clone());
        config
    }

    /// Merge `patch` into the current document, persist, and return the new
    /// document.
    pub fn update(&self, patch: ConfigPatch) -> Result<AppConfig, ConfigError> {
        let mut config = self.load();
        patch.apply(&mut config);
        self.persist(&config)?;
        *self.cached.lock().expect("config cache lock") = Some(config.clone());
        Ok(config)
    }

    /// Replace the whole document.
    pub fn save(&self, config: AppConfig) -> Result<AppConfig, ConfigError> {
        self.persist(&config)?;
        *self.cached.lock().expect("config cache lock") = Some(config.clone());
        Ok(config)
    }

    fn persist(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(config)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(raw.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceMode;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.json"))
    }

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let config = store.load();
        assert_eq!(config, AppConfig::default());
        assert!(store.path().exists());
    }

    #[test]
    fn update_persists_and_survives_reload() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .update(ConfigPatch {
                source_mode: Some(SourceMode::Separate),
                min_video_size_mb: Some(10),
                ..ConfigPatch::default()
            })
            .unwrap();

        let reopened = ConfigStore::new(store.path());
        let config = reopened.load();
        assert_eq!(config.source_mode, SourceMode::Separate);
        assert_eq!(config.min_video_size_mb, 10);
    }

    #[test]
    fn malformed_document_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::new(&path);
        let config = store.load();
        assert_eq!(config, AppConfig::default());

        // The broken file was replaced with a valid document.
        let raw = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<AppConfig>(&raw).is_ok());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.update(ConfigPatch::default()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
