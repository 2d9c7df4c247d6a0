use crate::{ClipboardError, ClipboardProvider};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct NoopClipboard;

impl ClipboardProvider for NoopClipboard {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn copy_file(&self, _path: &Path) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unsupported)
    }
}

/// Keeps every copied path in memory instead of touching the OS clipboard.
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    copied: Mutex<Vec<PathBuf>>,
}

impl RecordingClipboard {
    pub fn copied(&self) -> Vec<PathBuf> {
        self.copied
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl ClipboardProvider for RecordingClipboard {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn copy_file(&self, path: &Path) -> Result<(), ClipboardError> {
        self.copied
            .lock()
            .map_err(|_| ClipboardError::Backend("recorder lock poisoned".into()))?
            .push(path.to_path_buf());
        Ok(())
    }
}
