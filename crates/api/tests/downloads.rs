//! Integration tests for download and preview serving.

mod common;

use axum::http::StatusCode;
use common::{body_bytes, get, spawn_app_without_workers};

#[tokio::test]
async fn missing_video_is_404() {
    let app = spawn_app_without_workers(4).await;
    let response = get(&app, "/downloads/nothing_here.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn path_components_are_rejected() {
    let app = spawn_app_without_workers(4).await;
    std::fs::write(app.layout.uploads_dir.join("secret.mp3"), b"x").unwrap();

    let response = get(&app, "/downloads/..%2Fuploads%2Fsecret.mp3").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn existing_video_streams_as_attachment() {
    let app = spawn_app_without_workers(4).await;
    std::fs::write(app.layout.output_path("clip_2024.mp4"), b"video-bytes").unwrap();

    let response = get(&app, "/downloads/clip_2024.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert_eq!(response.headers()["content-length"], "11");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"clip_2024.mp4\""
    );
    assert_eq!(body_bytes(response).await, b"video-bytes");
}

#[tokio::test]
async fn previews_are_served_statically() {
    let app = spawn_app_without_workers(4).await;
    std::fs::write(app.layout.preview_path("preview-abc.png"), b"png-bytes").unwrap();

    let response = get(&app, "/previews/preview-abc.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"png-bytes");

    let missing = get(&app, "/previews/preview-none.png").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
