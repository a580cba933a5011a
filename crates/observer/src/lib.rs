//! Remote observer for stillcast jobs.
//!
//! Keeps a local cache of submitted jobs, reconciles it with the server's
//! authoritative list on start, and polls every unfinished job until it
//! reaches a terminal status. While any job is being polled a departure
//! hook stays armed so the host can warn before quitting.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod inflight;
pub mod observer;
pub mod poller;
pub mod reconcile;

pub use cache::{CacheEntry, LocalCache};
pub use client::{ApiClient, JobSource, RemoteJob, SubmitResponse};
pub use config::ObserverConfig;
pub use error::ObserverError;
pub use inflight::{DepartureGuard, DepartureHook, InFlightSet};
pub use observer::{Observer, ObserverEvent, StopReason};
