//! Multipart upload staging.
//!
//! Streams the `audio` and `image` parts of a submission to uniquely named
//! files under the uploads directory, validating their declared media
//! types first. Anything staged by a rejected request is removed again.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart, MultipartError};
use stillcast_core::media::{self, FIELD_AUDIO, FIELD_IMAGE};
use stillcast_core::naming;
use stillcast_core::storage::StorageLayout;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

/// One uploaded file written to the uploads directory.
///
/// The file is removed when this value is dropped, unless it was handed
/// over with [`StagedUpload::keep`]. A request dropped mid-upload therefore
/// leaves nothing behind.
#[derive(Debug)]
pub struct StagedUpload {
    /// File name as sent by the client.
    pub original_name: String,
    /// Unique name under the uploads directory.
    pub stored_name: String,
    pub size: u64,
    path: TempPath,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the file over to its job; it is no longer removed on drop.
    pub fn keep(self) -> PathBuf {
        let fallback = self.path.to_path_buf();
        match self.path.keep() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = %fallback.display(), error = %e.error, "Failed to keep staged upload");
                // The returned TempPath would delete the file; keep it alive.
                std::mem::forget(e.path);
                fallback
            }
        }
    }
}

/// The two staged inputs of a submission.
#[derive(Debug)]
pub struct UploadForm {
    pub audio: StagedUpload,
    pub image: StagedUpload,
}

impl UploadForm {
    /// Hand both files over to the job that will consume them.
    pub fn keep(self) {
        self.audio.keep();
        self.image.keep();
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::BadRequest(e.body_text())
}

/// Read a submission's multipart body and stage both files.
///
/// Unknown fields are ignored. Both parts are required, must carry a file
/// name and content, and must declare an accepted media type.
pub async fn stage_uploads(
    multipart: &mut Multipart,
    layout: &StorageLayout,
) -> AppResult<UploadForm> {
    let mut audio = None;
    let mut image = None;

    // On any early return the staged files drop and are removed.
    read_fields(multipart, layout, &mut audio, &mut image).await?;

    match (audio, image) {
        (Some(audio), Some(image)) => Ok(UploadForm { audio, image }),
        (audio, _) => {
            let missing = if audio.is_none() { FIELD_AUDIO } else { FIELD_IMAGE };
            Err(AppError::BadRequest(format!(
                "Missing required '{missing}' file"
            )))
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    layout: &StorageLayout,
    audio: &mut Option<StagedUpload>,
    image: &mut Option<StagedUpload>,
) -> AppResult<()> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        let slot = match name.as_str() {
            FIELD_AUDIO => {
                media::validate_audio_type(field.content_type())?;
                &mut *audio
            }
            FIELD_IMAGE => {
                media::validate_image_type(field.content_type())?;
                &mut *image
            }
            _ => continue,
        };

        if slot.is_some() {
            return Err(AppError::BadRequest(format!("Duplicate '{name}' field")));
        }

        let original_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("The '{name}' part has no file name")))?
            .to_string();

        *slot = Some(stage_field(field, layout, original_name).await?);
    }
    Ok(())
}

async fn stage_field(
    mut field: Field<'_>,
    layout: &StorageLayout,
    original_name: String,
) -> AppResult<StagedUpload> {
    let nonce = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let stored_name = naming::staged_input_name(&original_name, chrono::Utc::now(), &nonce);
    let path = layout.upload_path(&stored_name);

    let file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::InternalError(format!("create {}: {e}", path.display())))?;
    let path = TempPath::from_path(path);

    let size = write_field(&mut field, file, &path).await?;
    if size == 0 {
        return Err(AppError::BadRequest(format!(
            "Uploaded file '{original_name}' is empty"
        )));
    }

    tracing::debug!(file = %stored_name, size, "Staged upload");
    Ok(StagedUpload {
        original_name,
        stored_name,
        size,
        path,
    })
}

async fn write_field(
    field: &mut Field<'_>,
    mut file: tokio::fs::File,
    path: &Path,
) -> AppResult<u64> {
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(format!("write {}: {e}", path.display())))?;
        size += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::InternalError(format!("flush {}: {e}", path.display())))?;
    Ok(size)
}
