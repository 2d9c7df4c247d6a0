//! Loopback HTTP surface for the UI: cached thumbnails and seekable video files.
//!
//! Routes:
//!   GET /thumbnails/:identity  - cached JPEG bytes
//!   GET /video/*path           - the file at the path, with range support; the path
//!                                may be one `%2F`-encoded segment or plain absolute segments

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use slicer_core::thumbnails::ThumbnailCache;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub fn router(cache: Arc<ThumbnailCache>) -> Router {
    Router::new()
        .route("/thumbnails/:identity", get(thumbnail))
        .route("/video/", get(empty_video_path))
        .route("/video/*path", get(video))
        .layer(TraceLayer::new_for_http())
        .with_state(cache)
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    cache: Arc<ThumbnailCache>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "content server listening");
    }
    axum::serve(listener, router(cache))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn thumbnail(
    Path(identity): Path<String>,
    State(cache): State<Arc<ThumbnailCache>>,
) -> Response {
    match cache.get(&identity) {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        None => (StatusCode::NOT_FOUND, "thumbnail not cached").into_response(),
    }
}

async fn empty_video_path() -> Response {
    (StatusCode::BAD_REQUEST, "missing video path").into_response()
}

async fn video(Path(raw): Path<String>, request: Request) -> Response {
    if raw.trim().is_empty() {
        return empty_video_path().await;
    }
    let path = video_path(&raw);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            debug!(path = %path.display(), "video path is not a regular file");
            return (StatusCode::NOT_FOUND, "video not found").into_response();
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to stat video");
            }
            return (StatusCode::NOT_FOUND, "video not found").into_response();
        }
    }
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// The wildcard drops the leading `/` of an unencoded absolute path; put it back.
fn video_path(raw: &str) -> PathBuf {
    if cfg!(windows) || raw.starts_with('/') {
        PathBuf::from(raw)
    } else {
        PathBuf::from(format!("/{raw}"))
    }
}
