//! Storage layer: persisted user settings.
//!
//! Holds the JSON settings document and the store that reads and writes it at a
//! fixed per-user location.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub mod settings;

pub use settings::{MergeReport, Settings};

const APP_DIR: &str = "slicer";
const SETTINGS_DIR: &str = "settings";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no per-user configuration directory on this platform")]
    NoConfigDir,
    #[error("settings io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings file {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
}

/// File-backed settings store.
///
/// Read-modify-write updates go through [`SettingsStore::update`], which holds an
/// in-process lock so two concurrent preference changes cannot lose each other.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Store at `<config dir>/slicer/settings/settings.json`.
    pub fn open_default() -> Result<Self, StorageError> {
        let base = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::at(
            base.join(APP_DIR).join(SETTINGS_DIR).join(SETTINGS_FILE),
        ))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file yields defaults. Fields with the wrong type keep their default.
    pub fn load(&self) -> Result<Settings, StorageError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let value: Value = serde_json::from_slice(&data).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let Value::Object(map) = value else {
            return Err(StorageError::NotAnObject(self.path.clone()));
        };

        let mut settings = Settings::default();
        let report = settings.merge(&map);
        if !report.rejected.is_empty() {
            warn!(
                path = %self.path.display(),
                fields = ?report.rejected,
                "ignoring settings fields with unexpected types"
            );
        }
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        self.write_unlocked(settings)
    }

    /// Load, apply `f`, persist. Returns the persisted value.
    pub fn update<F>(&self, f: F) -> Result<Settings, StorageError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock();
        let mut settings = self.load()?;
        f(&mut settings);
        self.write_unlocked(&settings)?;
        Ok(settings)
    }

    /// Merge a partial JSON object into the stored settings and persist.
    pub fn merge(&self, patch: &Map<String, Value>) -> Result<(Settings, MergeReport), StorageError> {
        let _guard = self.write_lock.lock();
        let mut settings = self.load()?;
        let report = settings.merge(patch);
        self.write_unlocked(&settings)?;
        Ok((settings, report))
    }

    fn write_unlocked(&self, settings: &Settings) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let data = serde_json::to_vec_pretty(settings).map_err(|e| io_err(e.into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("nested").join("settings.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_is_defaults() {
        let (_dir, store) = store();
        let s = store.load().unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.file_extension, "mp4");
        assert_eq!(s.resolution, "source");
        assert_eq!(s.codec, "default");
    }

    #[test]
    fn save_location_round_trips() {
        let (_dir, store) = store();
        store.update(|s| s.save_location = "/x".into()).unwrap();
        let s = store.load().unwrap();
        assert_eq!(s.save_location, "/x");
        assert_eq!(s.file_extension, "mp4");
        assert_eq!(s.codec, "default");
    }

    #[test]
    fn update_keeps_other_fields() {
        let (_dir, store) = store();
        store.update(|s| s.watch_location = "/watch".into()).unwrap();
        store.update(|s| s.save_location = "/save".into()).unwrap();
        let s = store.load().unwrap();
        assert_eq!(s.watch_location, "/watch");
        assert_eq!(s.save_location, "/save");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (dir, _) = store();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"codec":"libx265","copy_to_clipboard":"yes"}"#).unwrap();
        let s = SettingsStore::at(&path).load().unwrap();
        assert_eq!(s.codec, "libx265");
        assert!(!s.copy_to_clipboard);
        assert_eq!(s.resolution, "source");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let (dir, _) = store();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SettingsStore::at(&path).load(),
            Err(StorageError::Parse { .. })
        ));
        std::fs::write(&path, "[1,2]").unwrap();
        assert!(matches!(
            SettingsStore::at(&path).load(),
            Err(StorageError::NotAnObject(_))
        ));
    }

    #[test]
    fn merge_persists_and_reports() {
        let (_dir, store) = store();
        let patch = json!({"resolution": "720p", "bitrate": 5, "theme": "dark"});
        let (s, report) = store.merge(patch.as_object().unwrap()).unwrap();
        assert_eq!(s.resolution, "720p");
        assert_eq!(s.bitrate, "");
        assert_eq!(report.applied, vec!["resolution".to_string()]);
        assert_eq!(report.rejected, vec!["bitrate".to_string()]);
        assert_eq!(report.unknown, vec!["theme".to_string()]);
        assert_eq!(store.load().unwrap().resolution, "720p");
    }
}
