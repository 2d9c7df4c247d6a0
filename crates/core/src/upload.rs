use crate::error::{Result, SlicerError};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const STAGING_DIR: &str = "slicer-uploads";

pub fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join(STAGING_DIR)
}

/// Writes an uploaded blob under `root` as `<hash prefix>_<base name>` and
/// returns its path. Identical uploads land on the same file.
pub async fn stage_upload(root: &Path, bytes: &[u8], file_name: &str) -> Result<PathBuf> {
    let base = Path::new(file_name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| SlicerError::invalid(format!("upload name {file_name:?} has no file name")))?;

    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| SlicerError::io_at("creating staging directory", root, e))?;

    let hash = blake3::hash(bytes).to_hex();
    let path = root.join(format!("{}_{}", &hash.as_str()[..16], base));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| SlicerError::io_at("writing upload", &path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "upload staged");
    Ok(path)
}
