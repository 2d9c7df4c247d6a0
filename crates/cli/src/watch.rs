//! Directory watcher: one notify subscription at a time, republished as
//! payload-free coarse events so the UI knows to list the directory again.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use slicer_core::SlicerError;
use std::path::{Path, PathBuf};
use parking_lot::Mutex as Gate;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    Created,
    Removed,
    Renamed,
    Changed,
}

impl WatchEvent {
    /// Event name as emitted to the UI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "file-created",
            Self::Removed => "file-removed",
            Self::Renamed => "file-renamed",
            Self::Changed => "file-changed",
        }
    }
}

/// Access and other notifications carry nothing worth a re-scan.
pub fn classify(kind: &EventKind) -> Option<WatchEvent> {
    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created),
        EventKind::Remove(_) => Some(WatchEvent::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchEvent::Renamed),
        EventKind::Modify(_) => Some(WatchEvent::Changed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

struct WatchSession {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    active: Arc<Gate<bool>>,
    cancel: oneshot::Sender<()>,
    pump: JoinHandle<()>,
}

impl WatchSession {
    /// The pump is spawned only after the handle is attached to `dir`.
    fn start(dir: &Path, events: broadcast::Sender<WatchEvent>) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let active = Arc::new(Gate::new(true));
        let (cancel, cancelled) = oneshot::channel();
        let pump = tokio::spawn(pump(
            dir.to_path_buf(),
            rx,
            cancelled,
            active.clone(),
            events,
        ));
        Ok(Self {
            dir: dir.to_path_buf(),
            watcher,
            active,
            cancel,
            pump,
        })
    }

    /// Stops publication, closes the handle and waits for the pump to exit.
    async fn close(self) {
        let WatchSession {
            dir,
            watcher,
            active,
            cancel,
            pump,
        } = self;
        // Once this returns the pump can no longer publish.
        *active.lock() = false;
        let _ = cancel.send(());
        drop(watcher);
        if let Err(e) = pump.await {
            warn!(dir = %dir.display(), error = %e, "watch pump ended abnormally");
        }
        info!(dir = %dir.display(), "stopped watching");
    }
}

async fn pump(
    dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut cancelled: oneshot::Receiver<()>,
    active: Arc<Gate<bool>>,
    events: broadcast::Sender<WatchEvent>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut cancelled => break,
            msg = rx.recv() => match msg {
                None => break,
                Some(Ok(event)) => {
                    let Some(coarse) = classify(&event.kind) else {
                        continue;
                    };
                    trace!(dir = %dir.display(), event = coarse.name(), paths = ?event.paths, "fs event");
                    if !publish(&active, &events, coarse) {
                        break;
                    }
                }
                Some(Err(e)) => warn!(dir = %dir.display(), error = %e, "watch error"),
            },
        }
    }
    debug!(dir = %dir.display(), "watch pump exited");
}

/// Sends `event` unless the session gate is closed. The check and the send
/// happen under one lock so `close` cannot slip between them.
fn publish(active: &Gate<bool>, events: &broadcast::Sender<WatchEvent>, event: WatchEvent) -> bool {
    let open = active.lock();
    if !*open {
        return false;
    }
    // No subscribers is fine.
    let _ = events.send(event);
    true
}

/// Owns at most one [`WatchSession`]. Replacing the directory is serialized and
/// the old pump is joined before the new handle is opened.
pub struct DirectoryWatcher {
    session: Mutex<Option<WatchSession>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for DirectoryWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryWatcher {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Switches to `dir`. On error the previous session is already gone and
    /// nothing is watched.
    pub async fn watch(&self, dir: &Path) -> Result<(), SlicerError> {
        let mut session = self.session.lock().await;
        if let Some(old) = session.take() {
            old.close().await;
        }
        let started = WatchSession::start(dir, self.events.clone())
            .map_err(|e| watch_error(dir, e))?;
        info!(dir = %dir.display(), "watching directory");
        *session = Some(started);
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(old) = self.session.lock().await.take() {
            old.close().await;
        }
    }

    pub async fn current_dir(&self) -> Option<PathBuf> {
        self.session.lock().await.as_ref().map(|s| s.dir.clone())
    }
}

fn watch_error(dir: &Path, err: notify::Error) -> SlicerError {
    match err.kind {
        notify::ErrorKind::Io(source) => SlicerError::io_at("watching", dir, source),
        notify::ErrorKind::PathNotFound => SlicerError::io_at(
            "watching",
            dir,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ),
        other => SlicerError::io_at(
            "watching",
            dir,
            std::io::Error::other(format!("{other:?}")),
        ),
    }
}
