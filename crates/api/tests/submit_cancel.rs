//! Integration tests for requests dropped while a submission is in flight.

mod common;

use std::time::Duration;

use axum::body::Body;
use common::{
    files_in, multipart_body, multipart_request, song_and_cover, spawn_app_without_workers,
    BOUNDARY,
};
use futures::StreamExt;
use stillcast_core::job::JobStatus;
use stillcast_db::repositories::JobRepo;
use tower::ServiceExt;

const MP3: &[u8] = b"ID3\x03\x00\x00\x00fake-mp3-frames";

#[tokio::test]
async fn aborted_submit_still_enqueues_created_job() {
    let mut app = spawn_app_without_workers(4).await;
    let mut queue = app.queue.take().unwrap();

    let body = Body::from(multipart_body(&song_and_cover(MP3)));
    let request = multipart_request("/api/v1/jobs", body);
    let task = tokio::spawn(app.router.clone().oneshot(request));

    // Drop the request as soon as its record exists.
    let job = loop {
        if let Some(job) = JobRepo::list(&app.pool).await.unwrap().pop() {
            break job;
        }
        tokio::task::yield_now().await;
    };
    task.abort();
    let _ = task.await;

    let ticket = tokio::time::timeout(Duration::from_secs(5), queue.recv())
        .await
        .expect("ticket was never enqueued")
        .unwrap();
    assert_eq!(ticket.job_id, job.id);

    let stored = JobRepo::find_by_id(&app.pool, &job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Progress);
    let staged = files_in(&app.layout.uploads_dir);
    assert!(staged.contains(&ticket.audio_file_name));
    assert!(staged.contains(&ticket.image_file_name));
}

#[tokio::test]
async fn dropped_upload_leaves_no_staged_file() {
    let app = spawn_app_without_workers(4).await;

    // The audio part starts but the body never ends.
    let mut head = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"audio\"; filename=\"song.mp3\"\r\n\
         Content-Type: audio/mpeg\r\n\r\n"
    )
    .into_bytes();
    head.extend_from_slice(&[0x55; 16 * 1024]);
    let body = futures::stream::iter([Ok::<_, std::io::Error>(head)])
        .chain(futures::stream::pending::<Result<Vec<u8>, std::io::Error>>());
    let request = multipart_request("/api/v1/jobs", Body::from_stream(body));
    let task = tokio::spawn(app.router.clone().oneshot(request));

    let mut waited = Duration::ZERO;
    while files_in(&app.layout.uploads_dir).is_empty() {
        assert!(waited < Duration::from_secs(5), "upload was never staged");
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(!task.is_finished());

    task.abort();
    let _ = task.await;

    assert!(files_in(&app.layout.uploads_dir).is_empty());
    assert!(JobRepo::list(&app.pool).await.unwrap().is_empty());
}
