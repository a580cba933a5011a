//! Job dispatcher.
//!
//! Submissions reserve a slot in a bounded queue before their record is
//! created, so an accepted job always gets its executor run. A single
//! supervisor task drains the queue and runs at most `concurrency`
//! executors at once.

use std::sync::Arc;

use serde::Serialize;
use stillcast_core::error::CoreError;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_core::naming;
use stillcast_core::storage::{self, StorageLayout};
use stillcast_db::models::job::NewJob;
use stillcast_db::repositories::JobRepo;
use stillcast_db::DbPool;
use stillcast_pipeline::{ExecutionError, Executor, JobTicket};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{AppError, AppResult};
use crate::upload::UploadForm;

/// Response payload of a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub id: JobId,
    pub status: JobStatus,
    pub title: String,
    /// `None` when the preview copy could not be written.
    pub preview_url: Option<String>,
}

/// Create a dispatch queue holding at most `capacity` waiting jobs.
pub fn dispatch_channel(capacity: usize) -> (DispatchHandle, mpsc::Receiver<JobTicket>) {
    let (tx, rx) = mpsc::channel(capacity);
    (DispatchHandle { tx }, rx)
}

/// Sending side of the dispatch queue, held in the app state.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<JobTicket>,
}

impl DispatchHandle {
    /// Accept one submission.
    ///
    /// Order: reserve a queue slot, create the record, copy the preview,
    /// enqueue. Without a free slot nothing is created and the staged
    /// uploads are removed.
    ///
    /// Everything after the reservation runs on its own task, so a caller
    /// dropped mid-way (request timeout, client disconnect) cannot leave a
    /// created record that is never enqueued.
    pub async fn submit(
        &self,
        pool: &DbPool,
        layout: &StorageLayout,
        form: UploadForm,
    ) -> AppResult<SubmittedJob> {
        let permit = match self.tx.clone().try_reserve_owned() {
            Ok(permit) => permit,
            Err(e) => {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "Too many jobs are waiting, try again later",
                    mpsc::error::TrySendError::Closed(_) => "The server is shutting down",
                };
                tracing::warn!(reason, "Submission rejected");
                return Err(CoreError::Unavailable(reason.into()).into());
            }
        };

        let task = tokio::spawn(enqueue(pool.clone(), layout.clone(), form, permit));
        task.await
            .map_err(|e| AppError::InternalError(format!("submission task failed: {e}")))?
    }
}

/// Create the record, copy the preview and send the ticket.
async fn enqueue(
    pool: DbPool,
    layout: StorageLayout,
    form: UploadForm,
    permit: mpsc::OwnedPermit<JobTicket>,
) -> AppResult<SubmittedJob> {
    let input = NewJob {
        id: JobId::new(),
        title: naming::title_from_file_name(&form.audio.original_name),
        audio_file_name: form.audio.stored_name.clone(),
        image_file_name: form.image.stored_name.clone(),
    };
    // On failure the form drops here and the staged uploads go with it.
    let job = JobRepo::create(&pool, &input).await?;

    let preview_name = naming::preview_file_name(&job.id, &form.image.original_name);
    let preview_url = match tokio::fs::copy(form.image.path(), layout.preview_path(&preview_name)).await {
        Ok(_) => Some(storage::preview_url(&preview_name)),
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to copy preview image");
            None
        }
    };

    let ticket = JobTicket {
        job_id: job.id,
        audio_file_name: job.audio_file_name.clone(),
        image_file_name: job.image_file_name.clone(),
        output_file_name: naming::output_file_name(&job.title, job.created_at, &job.id),
    };
    form.keep();
    permit.send(ticket);

    tracing::info!(job_id = %job.id, title = %job.title, "Job submitted");

    Ok(SubmittedJob {
        id: job.id,
        status: job.status,
        title: job.title,
        preview_url,
    })
}

/// Supervisor draining the dispatch queue into executor runs.
pub struct JobDispatcher {
    executor: Executor,
    concurrency: usize,
    tracker: TaskTracker,
}

impl JobDispatcher {
    pub fn new(executor: Executor, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
            tracker: TaskTracker::new(),
        }
    }

    /// Tracker of running executors; `wait()` resolves once all have
    /// finished after [`run`](Self::run) returns.
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Run the supervisor loop until the queue closes or `cancel` fires.
    ///
    /// Jobs still queued on cancellation are not started; they stay in
    /// `progress` and are failed by the next startup recovery.
    pub async fn run(self, mut queue: mpsc::Receiver<JobTicket>, cancel: CancellationToken) {
        let slots = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "Job dispatcher started");

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ticket = tokio::select! {
                _ = cancel.cancelled() => break,
                ticket = queue.recv() => match ticket {
                    Some(ticket) => ticket,
                    None => break,
                },
            };

            let executor = self.executor.clone();
            self.tracker.spawn(async move {
                let _permit = permit;
                tracing::info!(job_id = %ticket.job_id, "Executor started");
                if let Err(e) = executor.run(&ticket).await {
                    log_execution_error(&e);
                }
            });
        }

        queue.close();
        while let Ok(ticket) = queue.try_recv() {
            tracing::warn!(job_id = %ticket.job_id, "Job left queued at shutdown");
        }
        self.tracker.close();
        tracing::info!(running = self.tracker.len(), "Job dispatcher stopped");
    }
}

fn log_execution_error(e: &ExecutionError) {
    match e {
        ExecutionError::Cleanup { .. } => {
            tracing::warn!(job_id = %e.job_id(), error_class = e.class(), error = %e, "Job finished with cleanup failure");
        }
        _ => {
            tracing::error!(job_id = %e.job_id(), error_class = e.class(), error = %e, "Job failed");
        }
    }
}
