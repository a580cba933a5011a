#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_observer::{
    CacheEntry, DepartureGuard, JobSource, LocalCache, Observer, ObserverError, ObserverEvent,
    RemoteJob,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Fake job source
// ---------------------------------------------------------------------------

/// One scripted answer to `get_job`.
#[derive(Debug, Clone)]
pub enum Reply {
    Progress,
    Finished(&'static str),
    Error,
    NotFound,
}

/// Job source answering from scripts. The last reply of a script repeats.
#[derive(Default)]
pub struct FakeSource {
    list: Mutex<Option<Vec<RemoteJob>>>,
    scripts: Mutex<HashMap<JobId, VecDeque<Reply>>>,
    calls: Mutex<Vec<(JobId, Instant)>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `list_jobs` return `jobs`. Without this call it fails.
    pub fn set_list(&self, jobs: Vec<RemoteJob>) {
        *self.list.lock().unwrap() = Some(jobs);
    }

    pub fn script(&self, id: JobId, replies: &[Reply]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id, replies.iter().cloned().collect());
    }

    /// Instants of every `get_job` call for `id`.
    pub fn calls_for(&self, id: &JobId) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(call_id, _)| call_id == id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl JobSource for FakeSource {
    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ObserverError> {
        self.list.lock().unwrap().clone().ok_or(ObserverError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }

    async fn get_job(&self, id: &JobId) -> Result<RemoteJob, ObserverError> {
        self.calls.lock().unwrap().push((*id, Instant::now()));

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.get_mut(id).expect("unscripted job");
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().expect("empty script")
            }
        };

        let (status, output) = match reply {
            Reply::Progress => (JobStatus::Progress, None),
            Reply::Finished(name) => (JobStatus::Finished, Some(name.to_string())),
            Reply::Error => (JobStatus::Error, None),
            Reply::NotFound => {
                return Err(ObserverError::Status {
                    status: 404,
                    body: r#"{"error":"Job not found","code":"NOT_FOUND"}"#.into(),
                })
            }
        };
        Ok(remote_job(*id, status, output))
    }
}

pub fn remote_job(id: JobId, status: JobStatus, output: Option<String>) -> RemoteJob {
    RemoteJob {
        id,
        status,
        title: "song".into(),
        output_file_name: output,
        created_at: None,
    }
}

// ---------------------------------------------------------------------------
// Observer construction
// ---------------------------------------------------------------------------

pub fn cached_job(title: &str, status: JobStatus) -> CacheEntry {
    CacheEntry {
        id: JobId::new(),
        status,
        title: title.into(),
        preview_url: None,
        output_file_name: None,
        timestamp: Utc::now(),
    }
}

/// Cache file under `dir` holding `entries`, already flushed to disk.
pub async fn seeded_cache(dir: &Path, entries: &[CacheEntry]) -> LocalCache {
    let path = dir.join("jobs.json");
    let mut cache = LocalCache::empty(&path);
    for entry in entries {
        cache.upsert(entry.clone());
    }
    cache.flush().await.unwrap();
    LocalCache::load(&path).await
}

pub struct Harness {
    pub observer: Observer,
    pub events: mpsc::UnboundedReceiver<ObserverEvent>,
    pub guard: Arc<DepartureGuard>,
    pub source: Arc<FakeSource>,
}

pub fn observer_with(source: Arc<FakeSource>, cache: LocalCache) -> Harness {
    let guard = Arc::new(DepartureGuard::new());
    let (observer, events) = Observer::new(source.clone(), cache, guard.clone(), INTERVAL);
    Harness {
        observer,
        events,
        guard,
        source,
    }
}

/// Every event sent so far.
pub fn drain(events: &mut mpsc::UnboundedReceiver<ObserverEvent>) -> Vec<ObserverEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
