//! The observer: cache, reconciliation and poll loops wired together.
//!
//! An [`Observer`] owns the local cache, the in-flight set and one poll
//! task per unfinished job. Everything a renderer needs to show is sent
//! as an [`ObserverEvent`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stillcast_core::job::{JobId, JobStatus};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::cache::{CacheEntry, LocalCache};
use crate::client::{JobSource, RemoteJob, SubmitResponse};
use crate::inflight::{DepartureHook, InFlightSet};
use crate::poller::{poll_until_terminal, PollEnd};
use crate::reconcile::reconcile;

/// Why a poll loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The job finished and its video is downloadable.
    Finished,
    /// The job ended in `error`.
    Failed,
    /// A request failed; the job itself is unaffected.
    Transport(String),
    /// The observer shut down.
    Cancelled,
}

/// Something the renderer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// The reconciled job list, newest first.
    Listed(Vec<CacheEntry>),
    StatusChanged { id: JobId, status: JobStatus },
    /// A finished job's video can be downloaded. Sent once per job.
    DownloadReady {
        id: JobId,
        output_file_name: String,
        url: String,
    },
    PollStopped { id: JobId, reason: StopReason },
}

struct Shared {
    source: Arc<dyn JobSource>,
    cache: Mutex<LocalCache>,
    in_flight: InFlightSet,
    events: mpsc::UnboundedSender<ObserverEvent>,
}

/// Remote observer of one server's jobs.
pub struct Observer {
    shared: Arc<Shared>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    interval: Duration,
}

impl Observer {
    /// Create an observer and the receiving end of its event stream.
    ///
    /// `hook` is armed while at least one job is being polled.
    pub fn new(
        source: Arc<dyn JobSource>,
        cache: LocalCache,
        hook: Arc<dyn DepartureHook>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            source,
            cache: Mutex::new(cache),
            in_flight: InFlightSet::new(hook),
            events,
        });
        let observer = Self {
            shared,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            interval,
        };
        (observer, rx)
    }

    /// Reconcile the cache with the server and resume polling.
    ///
    /// A failed list request is logged and every cached job is treated as
    /// absent from the server, so cached statuses are kept.
    pub async fn restore(&self) {
        let authoritative = match self.shared.source.list_jobs().await {
            Ok(jobs) => Some(jobs),
            Err(e) => {
                tracing::warn!(error = %e, "Could not fetch job list, using cached statuses");
                None
            }
        };

        let result = {
            let mut cache = self.shared.cache.lock().await;
            let result = reconcile(&cache.entries_newest_first(), authoritative.as_deref());
            for entry in result.entries.iter().filter(|e| result.changed.contains(&e.id)) {
                cache.update_status(&entry.id, entry.status, entry.output_file_name.clone());
            }
            if !result.changed.is_empty() {
                tracing::info!(corrected = result.changed.len(), "Cache reconciled with server");
                flush_or_warn(&cache).await;
            }
            result
        };

        self.shared.emit(ObserverEvent::Listed(result.entries.clone()));
        for entry in &result.entries {
            if entry.status == JobStatus::Finished {
                if let Some(name) = &entry.output_file_name {
                    self.shared.emit_download(entry.id, name);
                }
            }
        }
        for id in result.to_poll {
            self.track(id);
        }
    }

    /// Cache a fresh submission and start polling it.
    pub async fn record_submission(&self, submitted: &SubmitResponse) {
        {
            let mut cache = self.shared.cache.lock().await;
            cache.upsert(CacheEntry {
                id: submitted.id,
                status: submitted.status,
                title: submitted.title.clone(),
                preview_url: submitted.preview_url.clone(),
                output_file_name: None,
                timestamp: Utc::now(),
            });
            flush_or_warn(&cache).await;
        }
        self.shared.emit(ObserverEvent::StatusChanged {
            id: submitted.id,
            status: submitted.status,
        });
        if submitted.status == JobStatus::Progress {
            self.track(submitted.id);
        }
    }

    /// Start a poll loop for `id` unless one is already running.
    pub fn track(&self, id: JobId) {
        if !self.shared.in_flight.insert(id) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let interval = self.interval;
        self.tracker.spawn(async move {
            tracing::debug!(job_id = %id, "Polling started");
            let end = poll_until_terminal(shared.source.as_ref(), id, interval, &cancel).await;
            shared.finish(id, end).await;
        });
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.len()
    }

    /// Snapshot of the cache, newest first.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.shared.cache.lock().await.entries_newest_first()
    }

    /// Wait until every poll loop has stopped.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Stop every poll loop and wait for them.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.wait().await;
    }
}

impl Shared {
    fn emit(&self, event: ObserverEvent) {
        let _ = self.events.send(event);
    }

    fn emit_download(&self, id: JobId, output_file_name: &str) {
        self.emit(ObserverEvent::DownloadReady {
            id,
            output_file_name: output_file_name.to_string(),
            url: self.source.download_link(output_file_name),
        });
    }

    async fn finish(&self, id: JobId, end: PollEnd) {
        match end {
            PollEnd::Terminal(job) => {
                self.emit(ObserverEvent::StatusChanged {
                    id,
                    status: job.status,
                });
                let reason = self.record_terminal(&job).await;
                self.in_flight.remove(&id);
                tracing::info!(job_id = %id, status = %job.status, "Job reached terminal status");
                self.emit(ObserverEvent::PollStopped { id, reason });
            }
            PollEnd::Failed(e) => {
                tracing::warn!(job_id = %id, error = %e, "Polling stopped after failed request");
                self.in_flight.remove(&id);
                self.emit(ObserverEvent::PollStopped {
                    id,
                    reason: StopReason::Transport(e.to_string()),
                });
            }
            PollEnd::Cancelled => {
                self.in_flight.remove(&id);
                self.emit(ObserverEvent::PollStopped {
                    id,
                    reason: StopReason::Cancelled,
                });
            }
        }
    }

    async fn record_terminal(&self, job: &RemoteJob) -> StopReason {
        let reason = match (job.status, &job.output_file_name) {
            (JobStatus::Finished, Some(name)) => {
                self.emit_download(job.id, name);
                StopReason::Finished
            }
            (JobStatus::Finished, None) => {
                tracing::warn!(job_id = %job.id, "Finished job reported without an output name");
                StopReason::Finished
            }
            _ => StopReason::Failed,
        };

        let mut cache = self.cache.lock().await;
        if cache.update_status(&job.id, job.status, job.output_file_name.clone()) {
            flush_or_warn(&cache).await;
        }
        reason
    }
}

async fn flush_or_warn(cache: &LocalCache) {
    if let Err(e) = cache.flush().await {
        tracing::warn!(path = %cache.path().display(), error = %e, "Failed to write job cache");
    }
}
