//! Lists the most recently modified videos in a directory.

use crate::error::{Result, SlicerError};
use crate::models::{identity_for, MediaEntry};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];
pub const DEFAULT_LIMIT: usize = 3;

#[derive(Debug)]
struct Candidate {
    name: String,
    path: PathBuf,
    modified: SystemTime,
}

/// Up to `limit` videos directly inside `dir`, newest first.
///
/// Entries that vanish between enumeration and the stat re-check are skipped.
pub fn list_recent(dir: &Path, limit: usize) -> Result<Vec<MediaEntry>> {
    if dir.as_os_str().is_empty() {
        return Err(SlicerError::invalid("directory path is empty"));
    }
    let meta = fs::metadata(dir).map_err(|e| SlicerError::io_at("reading directory", dir, e))?;
    if !meta.is_dir() {
        return Err(SlicerError::io_at(
            "reading directory",
            dir,
            std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        ));
    }

    let videos = build_video_globset()?;
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
                return Err(SlicerError::io_at("reading directory", dir, source));
            }
            Err(_) => continue,
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !videos.is_match(&name) {
            continue;
        }
        let path = entry.path().to_path_buf();
        // Re-stat: the file may have been removed since the listing.
        let meta = match fs::metadata(&path) {
            Ok(m) if !m.is_dir() => m,
            _ => {
                trace!(path = %path.display(), "skipping entry that failed re-check");
                continue;
            }
        };
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        candidates.push(Candidate {
            name,
            path,
            modified,
        });
    }

    // Stable: equal timestamps keep name order from the walk.
    candidates.sort_by(|a, b| b.modified.cmp(&a.modified));
    candidates.truncate(limit);

    let entries: Vec<MediaEntry> = candidates
        .into_iter()
        .map(|c| MediaEntry {
            identity: identity_for(&c.name, mtime_nanos(c.modified)),
            name: c.name,
            path: c.path,
        })
        .collect();
    debug!(dir = %dir.display(), found = entries.len(), "listed recent videos");
    Ok(entries)
}

fn mtime_nanos(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

fn build_video_globset() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in VIDEO_EXTENSIONS {
        let glob = GlobBuilder::new(&format!("*.{ext}"))
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| SlicerError::invalid(format!("extension pattern: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SlicerError::invalid(format!("extension patterns: {e}")))
}
