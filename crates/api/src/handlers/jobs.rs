//! Handlers for the `/jobs` resource.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use stillcast_core::error::CoreError;
use stillcast_core::job::JobId;
use stillcast_db::repositories::JobRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::upload;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Multipart form with an `audio` (MP3) and an `image` part. Returns 201
/// with the new job in `progress`; the transcode runs in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = upload::stage_uploads(&mut multipart, &state.layout).await?;
    let submitted = state
        .dispatcher
        .submit(&state.pool, &state.layout, form)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: submitted })))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Every job, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
///
/// A malformed id is reported as not found, like an unknown one.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: id.clone(),
        })
    };

    let job_id = id.parse::<JobId>().map_err(|_| not_found())?;
    let job = JobRepo::find_by_id(&state.pool, &job_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(DataResponse { data: job }))
}
