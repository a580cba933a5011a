//! Transcoding pipeline.
//!
//! [`Executor`] drives one job from `progress` to its terminal status:
//! probe the audio, encode the video, record the outcome, clean up.
//! The external engine sits behind the [`Transcoder`] port.

pub mod executor;
pub mod transcoder;

pub use executor::{ExecutionError, Executor, JobTicket};
pub use transcoder::{FfmpegTranscoder, Transcoder};
