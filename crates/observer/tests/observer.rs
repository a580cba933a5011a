mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_observer::poller::{poll_until_terminal, PollEnd};
use stillcast_observer::{LocalCache, ObserverEvent, StopReason, SubmitResponse};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn requests_are_spaced_by_the_interval() {
    let source = FakeSource::new();
    let id = JobId::new();
    source.script(id, &[Reply::Progress, Reply::Progress, Reply::Finished("song.mp4")]);

    let start = Instant::now();
    let end = poll_until_terminal(source.as_ref(), id, INTERVAL, &CancellationToken::new()).await;

    assert_matches!(end, PollEnd::Terminal(job) if job.status == JobStatus::Finished);
    let offsets: Vec<Duration> = source
        .calls_for(&id)
        .into_iter()
        .map(|at| at - start)
        .collect();
    assert_eq!(offsets, vec![INTERVAL, INTERVAL * 2, INTERVAL * 3]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_poll_makes_no_request() {
    let source = FakeSource::new();
    let id = JobId::new();
    source.script(id, &[Reply::Progress]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let end = poll_until_terminal(source.as_ref(), id, INTERVAL, &cancel).await;

    assert_matches!(end, PollEnd::Cancelled);
    assert!(source.calls_for(&id).is_empty());
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_request_after_finished() {
    let tmp = tempfile::tempdir().unwrap();
    let job = cached_job("song", JobStatus::Progress);
    let cache = seeded_cache(tmp.path(), std::slice::from_ref(&job)).await;

    let source = FakeSource::new();
    source.set_list(vec![remote_job(job.id, JobStatus::Progress, None)]);
    source.script(job.id, &[Reply::Progress, Reply::Progress, Reply::Finished("song.mp4")]);
    let mut h = observer_with(source, cache);

    h.observer.restore().await;
    assert!(h.guard.is_armed());
    h.observer.wait().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.source.calls_for(&job.id).len(), 3);
    assert!(!h.guard.is_armed());
    assert_eq!(h.observer.in_flight_count(), 0);

    let events = drain(&mut h.events);
    let downloads: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ObserverEvent::DownloadReady { .. }))
        .collect();
    assert_eq!(downloads.len(), 1);
    assert!(events.contains(&ObserverEvent::PollStopped {
        id: job.id,
        reason: StopReason::Finished,
    }));

    let on_disk = LocalCache::load(tmp.path().join("jobs.json")).await;
    let entry = on_disk.get(&job.id).unwrap();
    assert_eq!(entry.status, JobStatus::Finished);
    assert_eq!(entry.output_file_name.as_deref(), Some("song.mp4"));
    assert_eq!(entry.timestamp, job.timestamp);
}

#[tokio::test(start_paused = true)]
async fn failed_request_stops_polling_and_disarms() {
    let tmp = tempfile::tempdir().unwrap();
    let job = cached_job("song", JobStatus::Progress);
    let cache = seeded_cache(tmp.path(), std::slice::from_ref(&job)).await;

    let source = FakeSource::new();
    source.set_list(vec![remote_job(job.id, JobStatus::Progress, None)]);
    source.script(job.id, &[Reply::NotFound]);
    let mut h = observer_with(source, cache);

    h.observer.restore().await;
    h.observer.wait().await;

    assert_eq!(h.source.calls_for(&job.id).len(), 1);
    assert!(!h.guard.is_armed());
    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        ObserverEvent::PollStopped { reason: StopReason::Transport(_), .. }
    )));

    let on_disk = LocalCache::load(tmp.path().join("jobs.json")).await;
    assert_eq!(on_disk.get(&job.id).unwrap().status, JobStatus::Progress);
}

#[tokio::test(start_paused = true)]
async fn reconciliation_reveals_download_without_polling() {
    let tmp = tempfile::tempdir().unwrap();
    let job = cached_job("song", JobStatus::Progress);
    let cache = seeded_cache(tmp.path(), std::slice::from_ref(&job)).await;

    let source = FakeSource::new();
    source.set_list(vec![remote_job(
        job.id,
        JobStatus::Finished,
        Some("song_2024.mp4".into()),
    )]);
    let mut h = observer_with(source, cache);

    h.observer.restore().await;
    assert!(!h.guard.is_armed());
    h.observer.wait().await;

    assert!(h.source.calls_for(&job.id).is_empty());
    let events = drain(&mut h.events);
    assert_matches!(&events[0], ObserverEvent::Listed(entries) => {
        assert_eq!(entries[0].status, JobStatus::Finished);
    });
    assert!(events.iter().any(|e| matches!(
        e,
        ObserverEvent::DownloadReady { output_file_name, url, .. }
            if output_file_name == "song_2024.mp4" && url == "/downloads/song_2024.mp4"
    )));

    let on_disk = LocalCache::load(tmp.path().join("jobs.json")).await;
    let entry = on_disk.get(&job.id).unwrap();
    assert_eq!(entry.status, JobStatus::Finished);
    assert_eq!(entry.timestamp, job.timestamp);
}

#[tokio::test(start_paused = true)]
async fn failed_list_keeps_cached_status_and_polls() {
    let tmp = tempfile::tempdir().unwrap();
    let pending = cached_job("pending", JobStatus::Progress);
    let done = cached_job("done", JobStatus::Error);
    let cache = seeded_cache(tmp.path(), &[pending.clone(), done.clone()]).await;

    let source = FakeSource::new();
    source.script(pending.id, &[Reply::Error]);
    let mut h = observer_with(source, cache);

    h.observer.restore().await;
    let events = drain(&mut h.events);
    assert_matches!(&events[0], ObserverEvent::Listed(entries) => {
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.id == pending.id && e.status == JobStatus::Progress));
    });

    h.observer.wait().await;

    assert_eq!(h.source.calls_for(&pending.id).len(), 1);
    assert!(h.source.calls_for(&done.id).is_empty());
    let events = drain(&mut h.events);
    assert!(!events.iter().any(|e| matches!(e, ObserverEvent::DownloadReady { .. })));
    assert!(events.contains(&ObserverEvent::PollStopped {
        id: pending.id,
        reason: StopReason::Failed,
    }));
    let entries = h.observer.entries().await;
    assert!(entries.iter().all(|e| e.status == JobStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_running_polls() {
    let tmp = tempfile::tempdir().unwrap();
    let job = cached_job("song", JobStatus::Progress);
    let cache = seeded_cache(tmp.path(), std::slice::from_ref(&job)).await;

    let source = FakeSource::new();
    source.script(job.id, &[Reply::Progress]);
    let mut h = observer_with(source, cache);

    h.observer.restore().await;
    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(100)).await;
    h.observer.shutdown().await;

    assert_eq!(h.source.calls_for(&job.id).len(), 3);
    assert!(!h.guard.is_armed());
    assert!(drain(&mut h.events).contains(&ObserverEvent::PollStopped {
        id: job.id,
        reason: StopReason::Cancelled,
    }));
}

#[tokio::test(start_paused = true)]
async fn submission_is_cached_and_tracked() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = LocalCache::empty(tmp.path().join("jobs.json"));
    let id = JobId::new();

    let source = FakeSource::new();
    source.script(id, &[Reply::Finished("song.mp4")]);
    let h = observer_with(source, cache);

    h.observer
        .record_submission(&SubmitResponse {
            id,
            status: JobStatus::Progress,
            title: "song".into(),
            preview_url: Some(format!("/previews/preview-{id}.jpg")),
        })
        .await;
    h.observer.track(id);
    assert_eq!(h.observer.in_flight_count(), 1);

    h.observer.wait().await;

    let on_disk = LocalCache::load(tmp.path().join("jobs.json")).await;
    let entry = on_disk.get(&id).unwrap();
    assert_eq!(entry.status, JobStatus::Finished);
    assert_eq!(entry.title, "song");
    assert_eq!(h.source.calls_for(&id).len(), 1);
}
