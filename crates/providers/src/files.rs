use crate::{ClipboardError, ClipboardProvider};
use clipboard_rs::{Clipboard, ClipboardContext};
use std::path::Path;

/// Puts the file itself on the clipboard as a one-entry file list, so pasting
/// into a file manager or chat client yields the file rather than its path.
#[derive(Debug, Default)]
pub struct FileListClipboard;

impl ClipboardProvider for FileListClipboard {
    fn name(&self) -> &'static str {
        "file-list"
    }

    fn copy_file(&self, path: &Path) -> Result<(), ClipboardError> {
        let ctx = ClipboardContext::new()
            .map_err(|e| ClipboardError::Backend(format!("open clipboard context: {e}")))?;
        ctx.set_files(vec![path.to_string_lossy().into_owned()])
            .map_err(|e| ClipboardError::Backend(format!("set clipboard files: {e}")))
    }
}
