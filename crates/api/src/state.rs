use std::sync::Arc;

use stillcast_core::storage::StorageLayout;

use crate::config::ServerConfig;
use crate::engine::DispatchHandle;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: stillcast_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Where uploads, outputs and previews live.
    pub layout: StorageLayout,
    /// Sending side of the bounded dispatch queue.
    pub dispatcher: DispatchHandle,
}
