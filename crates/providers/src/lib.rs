//! Platform clipboard providers.
//!
//! Copying an exported file means different things per OS: Windows wants a
//! `CF_HDROP` file-drop payload so Explorer pastes the file itself, other
//! platforms get a file list through `clipboard-rs`. Both sit behind [`ClipboardProvider`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod file_drop;
pub mod noop;
#[cfg(not(windows))]
pub mod files;
#[cfg(windows)]
pub mod windows;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("file does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("clipboard backend failed: {0}")]
    Backend(String),
    #[error("clipboard is not available on this platform")]
    Unsupported,
}

pub trait ClipboardProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Place a reference to `path` on the clipboard. `path` is absolute and exists.
    fn copy_file(&self, path: &Path) -> Result<(), ClipboardError>;
}

/// Front door for clipboard copies: validates the path, then delegates.
#[derive(Clone)]
pub struct ClipboardBridge {
    provider: Arc<dyn ClipboardProvider>,
}

impl ClipboardBridge {
    pub fn new(provider: Arc<dyn ClipboardProvider>) -> Self {
        Self { provider }
    }

    /// The provider native to the current build target.
    pub fn system() -> Self {
        #[cfg(windows)]
        let provider: Arc<dyn ClipboardProvider> = Arc::new(windows::FileDropClipboard);
        #[cfg(not(windows))]
        let provider: Arc<dyn ClipboardProvider> = Arc::new(files::FileListClipboard);
        Self::new(provider)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn copy_file(&self, path: &Path) -> Result<(), ClipboardError> {
        if !path.exists() {
            return Err(ClipboardError::MissingFile(path.to_path_buf()));
        }
        let absolute = std::path::absolute(path)
            .map_err(|_| ClipboardError::MissingFile(path.to_path_buf()))?;
        debug!(provider = self.provider.name(), path = %absolute.display(), "copying file reference");
        self.provider.copy_file(&absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::RecordingClipboard;

    #[test]
    fn missing_file_is_rejected_before_provider() {
        let recorder = Arc::new(RecordingClipboard::default());
        let bridge = ClipboardBridge::new(recorder.clone());
        let dir = tempfile::tempdir().unwrap();
        let err = bridge.copy_file(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(err, ClipboardError::MissingFile(_)));
        assert!(recorder.copied().is_empty());
    }

    #[test]
    fn existing_file_reaches_provider_as_absolute_path() {
        let recorder = Arc::new(RecordingClipboard::default());
        let bridge = ClipboardBridge::new(recorder.clone());
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"x").unwrap();
        bridge.copy_file(&file).unwrap();
        let copied = recorder.copied();
        assert_eq!(copied, vec![file.clone()]);
        assert!(copied[0].is_absolute());
    }

    #[test]
    fn system_provider_copies_files_not_text() {
        let expected = if cfg!(windows) { "file-drop" } else { "file-list" };
        assert_eq!(ClipboardBridge::system().provider_name(), expected);
    }
}
