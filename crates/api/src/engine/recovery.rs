//! Startup recovery.
//!
//! A job found in `progress` before the dispatcher starts has no executor
//! and never will: re-running it would be a second run. Such jobs are
//! closed as `error` with their inputs left in place.

use stillcast_db::repositories::JobRepo;
use stillcast_db::{DbPool, StoreError};

/// Fail every orphaned `progress` job. Returns how many were closed.
pub async fn recover_orphaned_jobs(pool: &DbPool) -> Result<u64, StoreError> {
    let orphans = JobRepo::list_in_progress(pool).await?;
    if orphans.is_empty() {
        return Ok(0);
    }

    for job in &orphans {
        tracing::warn!(job_id = %job.id, title = %job.title, "Orphaned job will be marked as error");
    }

    let closed = JobRepo::fail_orphaned(pool).await?;
    tracing::info!(closed, "Startup recovery complete");
    Ok(closed)
}
