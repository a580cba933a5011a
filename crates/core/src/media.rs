//! Media-type rules for the two uploads a job needs.

use crate::error::CoreError;

/// The only accepted audio media type (MP3).
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// Prefix every accepted image media type must carry.
pub const IMAGE_PREFIX: &str = "image/";

/// Multipart field carrying the audio track.
pub const FIELD_AUDIO: &str = "audio";

/// Multipart field carrying the still image.
pub const FIELD_IMAGE: &str = "image";

/// Strip parameters (`; charset=...`) and normalise case.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Validate the media type declared for the audio upload.
pub fn validate_audio_type(content_type: Option<&str>) -> Result<(), CoreError> {
    match content_type.map(essence) {
        Some(ct) if ct == AUDIO_MPEG => Ok(()),
        Some(ct) => Err(CoreError::Validation(format!(
            "Audio must be {AUDIO_MPEG}, got '{ct}'"
        ))),
        None => Err(CoreError::Validation(format!(
            "Audio upload is missing a content type (expected {AUDIO_MPEG})"
        ))),
    }
}

/// Validate the media type declared for the image upload.
pub fn validate_image_type(content_type: Option<&str>) -> Result<(), CoreError> {
    match content_type.map(essence) {
        Some(ct) if ct.starts_with(IMAGE_PREFIX) && ct.len() > IMAGE_PREFIX.len() => Ok(()),
        Some(ct) => Err(CoreError::Validation(format!(
            "Image must be an image/* type, got '{ct}'"
        ))),
        None => Err(CoreError::Validation(
            "Image upload is missing a content type".into(),
        )),
    }
}

/// Guess a media type from a file extension, for clients uploading from disk.
pub fn content_type_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "mp3" => AUDIO_MPEG,
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
