use stillcast_core::job::{JobId, JobStatus};

/// Errors returned by the job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {id}")]
    NotFound { id: JobId },

    /// The job already left `progress`; its terminal status is final.
    #[error("Job {id} is already {status}")]
    AlreadyTerminal { id: JobId, status: JobStatus },

    /// A stored row violates the domain model (bad id or status text).
    #[error("Corrupt job row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
