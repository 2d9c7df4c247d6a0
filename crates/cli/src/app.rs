//! The object a UI binds to: every user-facing operation in one place.

use crate::watch::{DirectoryWatcher, WatchEvent};
use bytes::Bytes;
use providers::{ClipboardBridge, ClipboardError};
use serde::Serialize;
use serde_json::{Map, Value};
use slicer_core::config::{self, AppConfig};
use slicer_core::models::{CropRegion, ExportPreferences, ExportRequest, MediaEntry, TimeRange};
use slicer_core::orchestrator::{EncoderRunner, Orchestrator, ProcessRunner};
use slicer_core::pipeline::{self, ThumbnailService};
use slicer_core::thumbnails::ThumbnailCache;
use slicer_core::{upload, Result, SlicerError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{MergeReport, Settings, SettingsStore};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Clip export as requested by the UI. `None` overrides fall back to settings.
#[derive(Debug, Clone, Default)]
pub struct ClipParams {
    pub source: PathBuf,
    pub title: String,
    pub start: f64,
    pub end: f64,
    pub extension: Option<String>,
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CropParams {
    pub source: PathBuf,
    pub title: String,
    pub start: f64,
    pub end: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ClipboardStatus {
    NotRequested,
    Copied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub output: PathBuf,
    pub clipboard: ClipboardStatus,
}

/// Everything [`App`] needs from the outside world.
pub struct AppParts {
    pub config: AppConfig,
    pub settings: SettingsStore,
    pub encoder: Arc<dyn EncoderRunner>,
    pub clipboard: ClipboardBridge,
    pub staging_root: PathBuf,
}

pub struct App {
    config: AppConfig,
    settings: SettingsStore,
    orchestrator: Orchestrator,
    thumbnails: ThumbnailService,
    clipboard: ClipboardBridge,
    watcher: DirectoryWatcher,
    staging_root: PathBuf,
}

impl App {
    /// Production wiring: real encoder, OS clipboard, per-user settings file.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let encoder = Arc::new(ProcessRunner::new(&config.encoder.program));
        Ok(Self::new(AppParts {
            settings: SettingsStore::open_default()?,
            encoder,
            clipboard: ClipboardBridge::system(),
            staging_root: upload::default_staging_root(),
            config,
        }))
    }

    pub fn new(parts: AppParts) -> Self {
        let orchestrator = Orchestrator::new(parts.encoder);
        let cache = Arc::new(ThumbnailCache::new(parts.config.cache.capacity));
        Self {
            thumbnails: ThumbnailService::new(cache, orchestrator.clone()),
            orchestrator,
            settings: parts.settings,
            clipboard: parts.clipboard,
            watcher: DirectoryWatcher::new(),
            staging_root: parts.staging_root,
            config: parts.config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<ThumbnailCache> {
        self.thumbnails.cache().clone()
    }

    pub async fn list_recent_videos(&self, dir: impl AsRef<Path>) -> Result<Vec<MediaEntry>> {
        pipeline::list_with_thumbnails(dir.as_ref(), self.config.scan.limit, &self.thumbnails).await
    }

    pub fn thumbnail(&self, identity: &str) -> Result<Bytes> {
        self.thumbnails
            .cache()
            .get(identity)
            .ok_or_else(|| SlicerError::NotFound(format!("thumbnail {identity}")))
    }

    /// A settings file that exists but cannot be read stops the export.
    pub async fn export_clip(&self, params: ClipParams) -> Result<ExportOutcome> {
        let settings = self.settings.load()?;
        let mut prefs = ExportPreferences::from(&settings);
        if let Some(v) = params.extension {
            prefs.extension = v;
        }
        if let Some(v) = params.codec {
            prefs.codec = v;
        }
        if let Some(v) = params.resolution {
            prefs.resolution = v;
        }
        if let Some(v) = params.bitrate {
            prefs.bitrate = v;
        }
        let range = TimeRange::new(params.start, params.end)?;
        let request = ExportRequest::new(params.source, params.title, range, &prefs)?;
        self.run_export(request, &settings).await
    }

    pub async fn crop_video(&self, params: CropParams) -> Result<ExportOutcome> {
        let settings = self.settings.load()?;
        let prefs = ExportPreferences::from(&settings);
        let range = TimeRange::new(params.start, params.end)?;
        let region = CropRegion::new(params.x, params.y, params.width, params.height)?;
        let request =
            ExportRequest::new(params.source, params.title, range, &prefs)?.with_crop(region);
        self.run_export(request, &settings).await
    }

    async fn run_export(&self, request: ExportRequest, settings: &Settings) -> Result<ExportOutcome> {
        let save_dir = config::resolve_save_dir(&settings.save_location)?;
        let output = self.orchestrator.export(&request, &save_dir).await?;
        info!(output = %output.display(), "export finished");

        let clipboard = if !settings.copy_to_clipboard {
            ClipboardStatus::NotRequested
        } else {
            match self.copy_to_clipboard(&output).await {
                Ok(()) => ClipboardStatus::Copied,
                Err(e) => {
                    warn!(output = %output.display(), error = %e, "export finished but clipboard copy failed");
                    ClipboardStatus::Failed(e.to_string())
                }
            }
        };
        Ok(ExportOutcome { output, clipboard })
    }

    pub async fn copy_to_clipboard(&self, path: &Path) -> Result<()> {
        let bridge = self.clipboard.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || bridge.copy_file(&path))
            .await
            .map_err(|e| SlicerError::io("clipboard task", std::io::Error::other(e)))?
            .map_err(|e| match e {
                ClipboardError::MissingFile(p) => SlicerError::io_at(
                    "copying to clipboard",
                    &p,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ),
                other => other.into(),
            })
    }

    pub async fn handle_file_upload(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf> {
        upload::stage_upload(&self.staging_root, bytes, file_name).await
    }

    pub fn watch_location(&self) -> Result<String> {
        Ok(self.settings.load()?.watch_location)
    }

    /// Persists `location` and moves the watch session there. Empty stops watching.
    pub async fn set_watch_location(&self, location: &str) -> Result<()> {
        let location = location.trim().to_string();
        self.settings
            .update(|s| s.watch_location = location.clone())?;
        if location.is_empty() {
            self.watcher.stop().await;
            return Ok(());
        }
        self.watcher.watch(Path::new(&location)).await
    }

    /// Starts watching the persisted location, if any.
    pub async fn resume_watching(&self) -> Result<Option<PathBuf>> {
        let location = self.watch_location()?;
        if location.is_empty() {
            return Ok(None);
        }
        let dir = PathBuf::from(location);
        self.watcher.watch(&dir).await?;
        Ok(Some(dir))
    }

    pub async fn watching(&self) -> Option<PathBuf> {
        self.watcher.current_dir().await
    }

    pub fn save_location(&self) -> Result<String> {
        Ok(self.settings.load()?.save_location)
    }

    pub fn set_save_location(&self, location: &str) -> Result<()> {
        let location = location.trim().to_string();
        self.settings.update(|s| s.save_location = location)?;
        Ok(())
    }

    pub fn export_settings(&self) -> Result<Settings> {
        Ok(self.settings.load()?)
    }

    pub fn save_export_settings(&self, patch: &Map<String, Value>) -> Result<MergeReport> {
        let (_, report) = self.settings.merge(patch)?;
        if !report.rejected.is_empty() || !report.unknown.is_empty() {
            warn!(rejected = ?report.rejected, unknown = ?report.unknown, "settings fields not applied");
        }
        Ok(report)
    }

    pub fn subscribe_watch_events(&self) -> broadcast::Receiver<WatchEvent> {
        self.watcher.subscribe()
    }

    pub fn subscribe_thumbnail_ready(&self) -> broadcast::Receiver<String> {
        self.thumbnails.subscribe()
    }

    pub async fn shutdown(&self) {
        self.watcher.stop().await;
    }
}
