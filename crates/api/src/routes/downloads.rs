//! Root-level routes for generated videos and preview images.

use std::path::Path;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::handlers::downloads;
use crate::state::AppState;

/// ```text
/// GET    /downloads/{name}   -> download_video
/// GET    /previews/{name}    -> static file from the previews directory
/// ```
pub fn router(previews_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/downloads/{name}", get(downloads::download_video))
        .nest_service("/previews", ServeDir::new(previews_dir))
}
