//! Per-job execution state machine.
//!
//! ```text
//! Probing --ok--> Encoding --ok--> Done     (finished, inputs deleted)
//!    |               |
//!    +----err--------+-------> Failed       (error, inputs kept)
//! ```
//!
//! The executor is the only writer of its job's terminal status and
//! writes it exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use stillcast_core::ffmpeg::FfmpegError;
use stillcast_core::job::{JobId, TerminalOutcome};
use stillcast_core::storage::StorageLayout;
use stillcast_db::repositories::JobRepo;
use stillcast_db::{DbPool, StoreError};

use crate::transcoder::Transcoder;

/// Everything an executor needs to run one job.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: JobId,
    pub audio_file_name: String,
    pub image_file_name: String,
    /// Planned output name, persisted only once the encode succeeds.
    pub output_file_name: String,
}

/// Why a run did not end cleanly.
///
/// `Probe`, `Encode` and `Persist` leave the job in `error`. `Cleanup`
/// happens after the job is already `finished` and does not change it.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("probe failed for job {job_id}: {source}")]
    Probe {
        job_id: JobId,
        #[source]
        source: FfmpegError,
    },

    #[error("encode failed for job {job_id}: {source}")]
    Encode {
        job_id: JobId,
        #[source]
        source: FfmpegError,
    },

    #[error("failed to record outcome of job {job_id}: {source}")]
    Persist {
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("failed to remove {} for job {job_id}: {source}", path.display())]
    Cleanup {
        job_id: JobId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    pub fn job_id(&self) -> JobId {
        match self {
            ExecutionError::Probe { job_id, .. }
            | ExecutionError::Encode { job_id, .. }
            | ExecutionError::Persist { job_id, .. }
            | ExecutionError::Cleanup { job_id, .. } => *job_id,
        }
    }

    /// Short error class for structured logs.
    pub fn class(&self) -> &'static str {
        match self {
            ExecutionError::Probe { .. } => "probe",
            ExecutionError::Encode { .. } => "encode",
            ExecutionError::Persist { .. } => "persist",
            ExecutionError::Cleanup { .. } => "cleanup",
        }
    }
}

/// Runs jobs against the store, the storage layout and a transcoder.
#[derive(Clone)]
pub struct Executor {
    pool: DbPool,
    layout: StorageLayout,
    transcoder: Arc<dyn Transcoder>,
}

impl Executor {
    pub fn new(pool: DbPool, layout: StorageLayout, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            pool,
            layout,
            transcoder,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Run one job to its terminal status.
    pub async fn run(&self, ticket: &JobTicket) -> Result<(), ExecutionError> {
        let job_id = ticket.job_id;
        let started = Instant::now();
        let audio = self.layout.upload_path(&ticket.audio_file_name);
        let image = self.layout.upload_path(&ticket.image_file_name);
        let output = self.layout.output_path(&ticket.output_file_name);

        tracing::debug!(job_id = %job_id, audio = %audio.display(), "Probing audio");
        let duration_secs = match self.transcoder.probe_duration(&audio).await {
            Ok(secs) => secs,
            Err(source) => {
                self.record_failure(job_id).await;
                return Err(ExecutionError::Probe { job_id, source });
            }
        };

        tracing::debug!(job_id = %job_id, duration_secs, "Encoding video");
        if let Err(source) = self
            .transcoder
            .encode(&audio, &image, &output, duration_secs)
            .await
        {
            remove_if_present(&output).await;
            self.record_failure(job_id).await;
            return Err(ExecutionError::Encode { job_id, source });
        }

        let outcome = TerminalOutcome::Finished {
            output_file_name: ticket.output_file_name.clone(),
        };
        if let Err(source) = JobRepo::set_terminal(&self.pool, &job_id, &outcome).await {
            remove_if_present(&output).await;
            self.record_failure(job_id).await;
            return Err(ExecutionError::Persist { job_id, source });
        }

        tracing::info!(
            job_id = %job_id,
            output = %ticket.output_file_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job finished",
        );

        // Inputs go only after the finished status is durable.
        let mut first_failure = None;
        for input in [audio, image] {
            if let Err(source) = remove_input(&input).await {
                tracing::warn!(job_id = %job_id, path = %input.display(), error = %source, "Input cleanup failed");
                first_failure.get_or_insert(ExecutionError::Cleanup {
                    job_id,
                    path: input,
                    source,
                });
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Best-effort `error` write. Inputs stay where they are.
    async fn record_failure(&self, job_id: JobId) {
        match JobRepo::set_terminal(&self.pool, &job_id, &TerminalOutcome::Error).await {
            Ok(()) => tracing::info!(job_id = %job_id, "Job marked as error"),
            Err(StoreError::AlreadyTerminal { status, .. }) => {
                tracing::warn!(job_id = %job_id, %status, "Job already terminal, error not recorded");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as error");
            }
        }
    }
}

async fn remove_input(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a partial or orphaned output so no record can reference it.
async fn remove_if_present(path: &Path) {
    if let Err(e) = remove_input(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove output file");
    }
}
