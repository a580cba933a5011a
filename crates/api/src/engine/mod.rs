//! Job execution engine.
//!
//! Contains the bounded dispatch queue and the supervisor that hands
//! queued jobs to the transcoding executor, plus startup recovery of jobs
//! whose executor was lost.

pub mod dispatcher;
pub mod recovery;

pub use dispatcher::{dispatch_channel, DispatchHandle, JobDispatcher, SubmittedJob};
