//! Domain building blocks shared by every stillcast crate.
//!
//! Holds the job state machine, artifact naming rules, upload media-type
//! rules and the ffmpeg/ffprobe command utilities. Has no dependency on the
//! database or the HTTP layer.

pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod media;
pub mod naming;
pub mod storage;
pub mod types;
