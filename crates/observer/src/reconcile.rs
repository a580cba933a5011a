//! Merge the local cache with the server's job list.

use std::collections::HashMap;

use stillcast_core::job::{JobId, JobStatus};

use crate::cache::CacheEntry;
use crate::client::RemoteJob;

/// Result of reconciling the cache against the authoritative list.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Every cached job with its effective status, newest first.
    pub entries: Vec<CacheEntry>,
    /// Jobs whose cached status or output name was corrected.
    pub changed: Vec<JobId>,
    /// Jobs still in `progress` that need a poll loop.
    pub to_poll: Vec<JobId>,
}

/// Reconcile cached entries with the authoritative job list.
///
/// `authoritative` is `None` when the list could not be fetched; every
/// cached job then counts as absent. The server wins for jobs it reports.
/// A cached job it does not report keeps its cached status. Jobs only the
/// server knows are ignored. Timestamps are never modified.
pub fn reconcile(cached: &[CacheEntry], authoritative: Option<&[RemoteJob]>) -> Reconciled {
    let remote: HashMap<JobId, &RemoteJob> = authoritative
        .unwrap_or_default()
        .iter()
        .map(|job| (job.id, job))
        .collect();

    let mut changed = Vec::new();
    let mut entries: Vec<CacheEntry> = cached
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            if let Some(job) = remote.get(&entry.id) {
                if entry.status != job.status || entry.output_file_name != job.output_file_name {
                    entry.status = job.status;
                    entry.output_file_name = job.output_file_name.clone();
                    changed.push(entry.id);
                }
            }
            entry
        })
        .collect();

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let to_poll = entries
        .iter()
        .filter(|e| e.status == JobStatus::Progress)
        .map(|e| e.id)
        .collect();

    Reconciled {
        entries,
        changed,
        to_poll,
    }
}
