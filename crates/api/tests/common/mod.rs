#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use stillcast_api::config::ServerConfig;
use stillcast_api::engine::{dispatch_channel, JobDispatcher};
use stillcast_api::router::build_app_router;
use stillcast_api::state::AppState;
use stillcast_core::ffmpeg::FfmpegError;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_core::storage::StorageLayout;
use stillcast_db::models::job::Job;
use stillcast_db::repositories::JobRepo;
use stillcast_db::DbPool;
use stillcast_pipeline::{Executor, JobTicket, Transcoder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config(layout: &StorageLayout) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        uploads_dir: layout.uploads_dir.clone(),
        output_dir: layout.output_dir.clone(),
        previews_dir: layout.previews_dir.clone(),
        worker_concurrency: 2,
        dispatch_queue_capacity: 8,
        max_upload_bytes: 8 * 1024 * 1024,
        ffmpeg_bin: "ffmpeg".into(),
        ffprobe_bin: "ffprobe".into(),
    }
}

// ---------------------------------------------------------------------------
// Fake transcoder
// ---------------------------------------------------------------------------

/// Transcoder that rejects audio whose content starts with `CORRUPT` and
/// otherwise writes a small placeholder video.
pub struct FakeTranscoder;

pub const CORRUPT_AUDIO: &[u8] = b"CORRUPT not an mp3";
pub const FAKE_VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video";

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe_duration(&self, audio: &Path) -> Result<f64, FfmpegError> {
        let bytes = tokio::fs::read(audio).await?;
        if bytes.starts_with(b"CORRUPT") {
            return Err(FfmpegError::InvalidDuration);
        }
        Ok(3.0)
    }

    async fn encode(
        &self,
        _audio: &Path,
        _image: &Path,
        output: &Path,
        _duration_secs: f64,
    ) -> Result<(), FfmpegError> {
        tokio::fs::write(output, FAKE_VIDEO).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// A running test application and the resources behind it.
pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub layout: StorageLayout,
    pub cancel: CancellationToken,
    /// Present when no dispatcher drains the queue.
    pub queue: Option<mpsc::Receiver<JobTicket>>,
    _tmp: tempfile::TempDir,
}

pub async fn test_pool() -> DbPool {
    let pool = stillcast_db::create_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("in-memory pool");
    stillcast_db::run_migrations(&pool).await.expect("migrations");
    pool
}

async fn base(queue_capacity: usize) -> (TestApp, mpsc::Receiver<JobTicket>) {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::under(tmp.path());
    layout.ensure().await.unwrap();
    let pool = test_pool().await;

    let mut config = test_config(&layout);
    config.dispatch_queue_capacity = queue_capacity;
    let (handle, queue) = dispatch_channel(queue_capacity);

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        layout: layout.clone(),
        dispatcher: handle,
    };
    let router = build_app_router(state, &config);

    let app = TestApp {
        router,
        pool,
        layout,
        cancel: CancellationToken::new(),
        queue: None,
        _tmp: tmp,
    };
    (app, queue)
}

/// Full application with a dispatcher running [`FakeTranscoder`].
pub async fn spawn_app() -> TestApp {
    let (app, queue) = base(8).await;
    let executor = Executor::new(app.pool.clone(), app.layout.clone(), Arc::new(FakeTranscoder));
    let dispatcher = JobDispatcher::new(executor, 2);
    tokio::spawn(dispatcher.run(queue, app.cancel.clone()));
    app
}

/// Application whose queue is never drained, so jobs stay in `progress`.
pub async fn spawn_app_without_workers(queue_capacity: usize) -> TestApp {
    let (mut app, queue) = base(queue_capacity).await;
    app.queue = Some(queue);
    app
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One file part of a multipart request.
pub struct Part<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub const BOUNDARY: &str = "stillcast-test-boundary";

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The usual `song.mp3` + `cover.jpg` pair.
pub fn song_and_cover(audio: &'static [u8]) -> Vec<Part<'static>> {
    vec![
        Part {
            field: "audio",
            file_name: "song.mp3",
            content_type: "audio/mpeg",
            bytes: audio,
        },
        Part {
            field: "image",
            file_name: "cover.jpg",
            content_type: "image/jpeg",
            bytes: b"\xff\xd8\xff\xe0fake-jpeg",
        },
    ]
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

/// POST request carrying a multipart `body` framed with [`BOUNDARY`].
pub fn multipart_request(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

pub async fn post_multipart(app: &TestApp, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = multipart_request(uri, Body::from(multipart_body(parts)));
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Waiting and inspection
// ---------------------------------------------------------------------------

/// Poll the store until the job leaves `progress`.
pub async fn wait_for_terminal(pool: &DbPool, id: &JobId) -> Job {
    for _ in 0..500 {
        let job = JobRepo::find_by_id(pool, id).await.unwrap().unwrap();
        if job.status != JobStatus::Progress {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal status");
}

/// File names currently in `dir`.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
