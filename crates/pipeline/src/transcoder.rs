//! The transcoding engine port and its ffmpeg implementation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use stillcast_core::ffmpeg::{self, FfmpegError};

/// External engine able to measure an audio track and render the video.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Duration of `audio` in seconds. Must be positive.
    async fn probe_duration(&self, audio: &Path) -> Result<f64, FfmpegError>;

    /// Render `image` over `audio` into `output`, cut at `duration_secs`.
    async fn encode(
        &self,
        audio: &Path,
        image: &Path,
        output: &Path,
        duration_secs: f64,
    ) -> Result<(), FfmpegError>;
}

/// [`Transcoder`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    /// Resolve both binaries from `PATH`.
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, audio: &Path) -> Result<f64, FfmpegError> {
        ffmpeg::probe_duration(&self.ffprobe_bin, audio).await
    }

    async fn encode(
        &self,
        audio: &Path,
        image: &Path,
        output: &Path,
        duration_secs: f64,
    ) -> Result<(), FfmpegError> {
        let args = ffmpeg::build_encode_args(audio, image, output, duration_secs);
        tracing::debug!(
            command = %ffmpeg::display_command(&self.ffmpeg_bin, &args),
            "Starting ffmpeg",
        );

        let started = Instant::now();
        ffmpeg::run_ffmpeg(&self.ffmpeg_bin, &args).await?;
        tracing::info!(
            output = %output.display(),
            duration_secs,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ffmpeg encode completed",
        );
        Ok(())
    }
}
