//! Per-job status poll loop.

use std::time::Duration;

use stillcast_core::job::{JobId, JobStatus};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::{JobSource, RemoteJob};
use crate::error::ObserverError;

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollEnd {
    /// The job reached `finished` or `error`.
    Terminal(RemoteJob),
    /// A request failed; the loop does not retry.
    Failed(ObserverError),
    Cancelled,
}

/// Poll `id` every `interval` until it is terminal, a request fails or
/// `cancel` fires.
///
/// The first request goes out one interval after the call. Once a
/// terminal status is observed no further request is made.
pub async fn poll_until_terminal(
    source: &dyn JobSource,
    id: JobId,
    interval: Duration,
    cancel: &CancellationToken,
) -> PollEnd {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PollEnd::Cancelled,
            _ = ticker.tick() => {}
        }

        let job = tokio::select! {
            _ = cancel.cancelled() => return PollEnd::Cancelled,
            result = source.get_job(&id) => match result {
                Ok(job) => job,
                Err(e) => return PollEnd::Failed(e),
            },
        };

        match job.status {
            JobStatus::Progress => tracing::trace!(job_id = %id, "Job still in progress"),
            JobStatus::Finished | JobStatus::Error => return PollEnd::Terminal(job),
        }
    }
}
