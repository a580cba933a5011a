//! Jobs currently being polled, and the departure hook tied to them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stillcast_core::job::JobId;

/// Notified when the observer starts or stops having in-flight jobs.
///
/// Implementations are called with the in-flight lock held and must not
/// block.
pub trait DepartureHook: Send + Sync {
    /// At least one job is now in flight.
    fn arm(&self);
    /// No job is in flight any more.
    fn disarm(&self);
}

/// Flag consulted before exiting: armed while videos are still processing.
#[derive(Debug, Default)]
pub struct DepartureGuard {
    armed: AtomicBool,
}

impl DepartureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl DepartureHook for DepartureGuard {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

/// Set of job ids with an active poll.
///
/// The hook is armed on the transition from empty to non-empty and
/// disarmed on the transition back to empty, never otherwise.
pub struct InFlightSet {
    jobs: Mutex<HashSet<JobId>>,
    hook: Arc<dyn DepartureHook>,
}

impl InFlightSet {
    pub fn new(hook: Arc<dyn DepartureHook>) -> Self {
        Self {
            jobs: Mutex::new(HashSet::new()),
            hook,
        }
    }

    /// Add a job. Returns `false` when it was already in flight.
    pub fn insert(&self, id: JobId) -> bool {
        let mut jobs = self.lock();
        let was_empty = jobs.is_empty();
        let inserted = jobs.insert(id);
        if inserted && was_empty {
            self.hook.arm();
        }
        inserted
    }

    /// Remove a job. Returns `false` when it was not in flight.
    pub fn remove(&self, id: &JobId) -> bool {
        let mut jobs = self.lock();
        let removed = jobs.remove(id);
        if removed && jobs.is_empty() {
            self.hook.disarm();
        }
        removed
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        // A poisoned set still holds valid ids.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
