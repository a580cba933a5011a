//! FFmpeg/FFprobe command utilities.
//!
//! Probing an audio track for its duration and the single fixed encode
//! profile that turns one still image and one audio track into a 1080p
//! H.264/AAC video.

use std::ffi::OsString;
use std::path::Path;

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("input file not found: {0}")]
    InputNotFound(String),

    #[error("input has no usable duration")]
    InvalidDuration,
}

// ---------------------------------------------------------------------------
// Encode profile
// ---------------------------------------------------------------------------

/// Output frame width in pixels.
pub const OUTPUT_WIDTH: u32 = 1920;
/// Output frame height in pixels.
pub const OUTPUT_HEIGHT: u32 = 1080;

pub const VIDEO_CODEC: &str = "libx264";
pub const VIDEO_FRAME_RATE: &str = "24";
pub const VIDEO_BITRATE: &str = "8M";
pub const VIDEO_MAX_RATE: &str = "8M";
/// Twice the video bitrate.
pub const VIDEO_BUFFER_SIZE: &str = "16M";
pub const PIXEL_FORMAT: &str = "yuv420p";

/// AAC-LC.
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_CHANNELS: &str = "2";
pub const AUDIO_SAMPLE_RATE: &str = "48000";
pub const AUDIO_BITRATE: &str = "384k";

/// Scale down to fit 1920x1080 keeping the aspect ratio, then pad to the
/// full frame with the picture centred.
pub fn letterbox_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
    )
}

/// Build the ffmpeg argument list for one encode.
///
/// The still image is looped as the video track, the audio file supplies
/// the audio track, and the output is cut at `duration_secs`.
pub fn build_encode_args(
    audio: &Path,
    image: &Path,
    output: &Path,
    duration_secs: f64,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-i".into(),
        audio.as_os_str().to_owned(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.as_os_str().to_owned(),
    ];

    let size = format!("{OUTPUT_WIDTH}x{OUTPUT_HEIGHT}");
    let filter = letterbox_filter();
    let duration = format!("{duration_secs:.3}");

    for arg in [
        "-map", "1:v:0",
        "-map", "0:a:0",
        "-vf", &filter,
        "-s", &size,
        // Video
        "-c:v", VIDEO_CODEC,
        "-r", VIDEO_FRAME_RATE,
        "-b:v", VIDEO_BITRATE,
        "-maxrate", VIDEO_MAX_RATE,
        "-bufsize", VIDEO_BUFFER_SIZE,
        "-pix_fmt", PIXEL_FORMAT,
        // Audio
        "-c:a", AUDIO_CODEC,
        "-ac", AUDIO_CHANNELS,
        "-ar", AUDIO_SAMPLE_RATE,
        "-b:a", AUDIO_BITRATE,
        // Container
        "-movflags", "+faststart",
        "-t", &duration,
    ] {
        args.push(OsString::from(arg));
    }

    args.push(output.as_os_str().to_owned());
    args
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub channels: Option<i32>,
    pub sample_rate: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub size: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a media file and return the parsed JSON output.
pub async fn probe_media(ffprobe_bin: &Path, path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::InputNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new(ffprobe_bin)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Probe `path` and return its duration in seconds.
pub async fn probe_duration(ffprobe_bin: &Path, path: &Path) -> Result<f64, FfmpegError> {
    let probe = probe_media(ffprobe_bin, path).await?;
    parse_duration(&probe).ok_or(FfmpegError::InvalidDuration)
}

/// Run `ffmpeg` with the given arguments, failing on a non-zero exit.
pub async fn run_ffmpeg(ffmpeg_bin: &Path, args: &[OsString]) -> Result<(), FfmpegError> {
    let output = tokio::process::Command::new(ffmpeg_bin)
        .args(["-hide_banner", "-nostdin", "-loglevel", "error"])
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Render an argument list as a single shell-like line for logging.
pub fn display_command(bin: &Path, args: &[OsString]) -> String {
    let mut line = bin.to_string_lossy().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first audio stream in the ffprobe output.
fn first_audio_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
}

fn positive_secs(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Parse the media duration in seconds from ffprobe output.
///
/// Prefers the format-level duration and falls back to the first audio
/// stream. Returns `None` when neither carries a positive duration.
pub fn parse_duration(probe: &FfprobeOutput) -> Option<f64> {
    probe
        .format
        .duration
        .as_deref()
        .and_then(positive_secs)
        .or_else(|| {
            first_audio_stream(probe)
                .and_then(|s| s.duration.as_deref())
                .and_then(positive_secs)
        })
}
