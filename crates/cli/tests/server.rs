use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use cli::server::router;
use slicer_core::thumbnails::ThumbnailCache;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

/// Encodes every byte outside the unreserved set, slashes included.
fn encode_path(path: &Path) -> String {
    let mut out = String::new();
    for b in path.to_string_lossy().bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn video_request(path: &Path, range: Option<&str>) -> Request<Body> {
    let mut req = Request::get(format!("/video/{}", encode_path(path)));
    if let Some(range) = range {
        req = req.header(header::RANGE, range);
    }
    req.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn serves_whole_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip one.mp4");
    std::fs::write(&path, b"0123456789").unwrap();

    let res = router(Arc::new(ThumbnailCache::new(4)))
        .oneshot(video_request(&path, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"0123456789");
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, b"0123456789").unwrap();

    let res = router(Arc::new(ThumbnailCache::new(4)))
        .oneshot(video_request(&path, Some("bytes=2-5")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"2345");
}

#[tokio::test]
async fn missing_file_is_404() {
    let dir = tempdir().unwrap();
    let res = router(Arc::new(ThumbnailCache::new(4)))
        .oneshot(video_request(&dir.path().join("gone.mp4"), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn directory_is_404() {
    let dir = tempdir().unwrap();
    let res = router(Arc::new(ThumbnailCache::new(4)))
        .oneshot(video_request(dir.path(), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn unencoded_absolute_path_is_served() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.mp4");
    std::fs::write(&path, b"abc").unwrap();
    let uri = format!("/video{}", path.display());

    let res = router(Arc::new(ThumbnailCache::new(4)))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"abc");
}
