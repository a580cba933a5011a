//! Handler for downloading generated videos.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use stillcast_core::error::CoreError;
use stillcast_core::media;
use stillcast_core::naming;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// `Content-Disposition` value offering `file_name` as a download.
fn attachment(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"")
}

/// GET /downloads/{name}
///
/// Streams a generated video as an attachment. Only bare file names inside
/// the output directory are served.
pub async fn download_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    if !naming::is_bare_file_name(&name) {
        return Err(AppError::BadRequest(format!("Invalid file name '{name}'")));
    }

    let path = state.layout.output_path(&name);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Video",
                id: name,
            }));
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    tracing::debug!(file = %name, file_size, "Serving download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media::content_type_for_extension(&name))
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(header::CONTENT_DISPOSITION, attachment(&name))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
