//! Repository for the `jobs` table.
//!
//! A job leaves `progress` through exactly one conditional update; every
//! later terminal write is rejected, so the stored status is monotonic.

use chrono::{SecondsFormat, Utc};
use stillcast_core::job::{JobId, JobStatus, TerminalOutcome};

use crate::error::StoreError;
use crate::models::job::{Job, JobRow, NewJob};
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status, title, audio_file_name, image_file_name, output_file_name, created_at";

/// Current time as fixed-width RFC 3339 text, so lexical order is time order.
fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, StoreError> {
    rows.into_iter().map(Job::try_from).collect()
}

/// Provides the job record operations. Records are never deleted.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `progress` with no output.
    pub async fn create(pool: &DbPool, input: &NewJob) -> Result<Job, StoreError> {
        let query = format!(
            "INSERT INTO jobs (id, status, title, audio_file_name, image_file_name, \
                               output_file_name, created_at) \
             VALUES (?, ?, ?, ?, ?, NULL, ?) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(input.id.to_string())
            .bind(JobStatus::Progress.as_str())
            .bind(&input.title)
            .bind(&input.audio_file_name)
            .bind(&input.image_file_name)
            .bind(now_text())
            .fetch_one(pool)
            .await?;
        Job::try_from(row)
    }

    /// Find a job by id.
    pub async fn find_by_id(pool: &DbPool, id: &JobId) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// All jobs, newest first. Ties on `created_at` go to the later insert.
    pub async fn list(pool: &DbPool) -> Result<Vec<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs ORDER BY created_at DESC, rowid DESC");
        let rows = sqlx::query_as::<_, JobRow>(&query).fetch_all(pool).await?;
        into_jobs(rows)
    }

    /// Jobs still in `progress`, oldest first.
    pub async fn list_in_progress(pool: &DbPool) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE status = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Progress.as_str())
            .fetch_all(pool)
            .await?;
        into_jobs(rows)
    }

    /// Move a job from `progress` to its terminal status.
    ///
    /// Succeeds at most once per job. A job that already left `progress`
    /// yields [`StoreError::AlreadyTerminal`] and is not modified.
    pub async fn set_terminal(
        pool: &DbPool,
        id: &JobId,
        outcome: &TerminalOutcome,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = ?, output_file_name = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(outcome.status().as_str())
        .bind(outcome.output_file_name())
        .bind(id.to_string())
        .bind(JobStatus::Progress.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match Self::find_by_id(pool, id).await? {
            Some(job) => Err(StoreError::AlreadyTerminal {
                id: *id,
                status: job.status,
            }),
            None => Err(StoreError::NotFound { id: *id }),
        }
    }

    /// Mark every job still in `progress` as `error`.
    ///
    /// Only valid while no executor is running, i.e. at startup before any
    /// dispatch. Returns the number of jobs changed.
    pub async fn fail_orphaned(pool: &DbPool) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, output_file_name = NULL WHERE status = ?",
        )
        .bind(JobStatus::Error.as_str())
        .bind(JobStatus::Progress.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
