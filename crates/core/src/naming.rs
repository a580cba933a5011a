//! Artifact naming rules.
//!
//! Every artifact a job references (staged inputs, preview, output) gets a
//! name no other job can produce, so two jobs never share a path.

use std::path::Path;

use crate::job::JobId;
use crate::types::Timestamp;

/// Title used when an upload's file name has no usable stem.
pub const UNTITLED: &str = "untitled";

/// Extension of every generated video.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Replace path separators and control characters so a user-supplied name
/// can never escape the directory it is stored in.
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned
    }
}

/// Base name of an uploaded file without its extension.
///
/// `song.mp3` becomes `song`, `my.mix.mp3` becomes `my.mix`.
pub fn title_from_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base);
    sanitize_stem(stem)
}

/// Extension of `original_name` including the leading dot, or an empty
/// string when there is none.
pub fn dotted_extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Name under which an uploaded input is staged.
///
/// `{stem}-{timestamp}-{nonce}{.ext}`, e.g.
/// `song-2024-05-01T10-20-30-123Z-1a2b3c4d.mp3`.
pub fn staged_input_name(original_name: &str, now: Timestamp, nonce: &str) -> String {
    format!(
        "{}-{}-{}{}",
        title_from_file_name(original_name),
        now.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
        nonce,
        dotted_extension(original_name),
    )
}

/// Name of the preview copy of a job's image.
pub fn preview_file_name(job_id: &JobId, original_image_name: &str) -> String {
    format!("preview-{job_id}{}", dotted_extension(original_image_name))
}

/// Name of the video a job produces.
///
/// `{title}_{YYYY-MM-DD_HH-MM-SS}_{short id}.mp4`.
pub fn output_file_name(title: &str, created_at: Timestamp, job_id: &JobId) -> String {
    format!(
        "{}_{}_{}.{OUTPUT_EXTENSION}",
        sanitize_stem(title),
        created_at.format("%Y-%m-%d_%H-%M-%S"),
        job_id.short(),
    )
}

/// Whether `name` is a bare file name (no directory components), which is
/// the only form accepted when resolving downloads.
pub fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
