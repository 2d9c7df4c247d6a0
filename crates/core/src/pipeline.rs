//! Listing pipeline: scan a directory, then fill the thumbnail cache for each
//! entry concurrently.

use crate::error::{Result, SlicerError};
use crate::models::MediaEntry;
use crate::orchestrator::Orchestrator;
use crate::scanner;
use crate::thumbnails::ThumbnailCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const READY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStatus {
    Generated,
    AlreadyCached,
    /// Another task is generating this identity right now.
    InFlight,
    Failed,
}

/// Generates thumbnails into a shared cache, at most one generation per identity.
#[derive(Clone)]
pub struct ThumbnailService {
    cache: Arc<ThumbnailCache>,
    orchestrator: Orchestrator,
    in_flight: Arc<Mutex<HashSet<String>>>,
    ready: broadcast::Sender<String>,
}

/// Releases an in-flight claim when dropped.
struct Claim {
    set: Arc<Mutex<HashSet<String>>>,
    identity: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.set.lock().remove(&self.identity);
    }
}

impl ThumbnailService {
    pub fn new(cache: Arc<ThumbnailCache>, orchestrator: Orchestrator) -> Self {
        let (ready, _) = broadcast::channel(READY_CHANNEL_CAPACITY);
        Self {
            cache,
            orchestrator,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            ready,
        }
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// Identities whose thumbnail just landed in the cache.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.ready.subscribe()
    }

    fn claim(&self, identity: &str) -> Option<Claim> {
        let mut set = self.in_flight.lock();
        if !set.insert(identity.to_string()) {
            return None;
        }
        Some(Claim {
            set: self.in_flight.clone(),
            identity: identity.to_string(),
        })
    }

    /// Makes sure `entry` has a cached thumbnail. Failures are logged, not returned.
    pub async fn ensure(&self, entry: &MediaEntry) -> ThumbnailStatus {
        if self.cache.refresh(&entry.identity) {
            return ThumbnailStatus::AlreadyCached;
        }
        let Some(_claim) = self.claim(&entry.identity) else {
            debug!(identity = %entry.identity, "thumbnail already being generated");
            return ThumbnailStatus::InFlight;
        };
        // Finished between the refresh check and the claim.
        if self.cache.refresh(&entry.identity) {
            return ThumbnailStatus::AlreadyCached;
        }
        match self.orchestrator.thumbnail(&entry.path).await {
            Ok(bytes) => {
                debug!(identity = %entry.identity, bytes = bytes.len(), "thumbnail cached");
                self.cache.put(entry.identity.clone(), bytes);
                let _ = self.ready.send(entry.identity.clone());
                ThumbnailStatus::Generated
            }
            Err(e) => {
                warn!(identity = %entry.identity, path = %entry.path.display(), error = %e, "thumbnail generation failed");
                ThumbnailStatus::Failed
            }
        }
    }
}

/// Lists up to `limit` recent videos in `dir` and generates their thumbnails
/// concurrently. A failed thumbnail never drops its entry from the result.
pub async fn list_with_thumbnails(
    dir: &Path,
    limit: usize,
    thumbnails: &ThumbnailService,
) -> Result<Vec<MediaEntry>> {
    let dir: PathBuf = dir.to_path_buf();
    let scan_dir = dir.clone();
    let entries = tokio::task::spawn_blocking(move || scanner::list_recent(&scan_dir, limit))
        .await
        .map_err(|e| SlicerError::io("scanner task", std::io::Error::other(e)))??;

    let mut tasks = JoinSet::new();
    for entry in entries.iter().cloned() {
        let service = thumbnails.clone();
        tasks.spawn(async move { service.ensure(&entry).await });
    }
    let mut generated = 0usize;
    let mut failed = 0usize;
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(ThumbnailStatus::Generated) => generated += 1,
            Ok(ThumbnailStatus::Failed) => failed += 1,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "thumbnail task aborted");
                failed += 1;
            }
        }
    }
    info!(
        dir = %dir.display(),
        listed = entries.len(),
        generated,
        failed,
        "listing complete"
    );
    Ok(entries)
}
