use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stillcast_api::config::ServerConfig;
use stillcast_api::engine::recovery::recover_orphaned_jobs;
use stillcast_api::engine::{dispatch_channel, JobDispatcher};
use stillcast_api::router::build_app_router;
use stillcast_api::state::AppState;
use stillcast_pipeline::{Executor, FfmpegTranscoder};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stillcast_api=debug,stillcast_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let layout = config.storage_layout();
    layout
        .ensure()
        .await
        .context("Failed to create storage directories")?;
    tracing::info!(
        uploads = %layout.uploads_dir.display(),
        output = %layout.output_dir.display(),
        previews = %layout.previews_dir.display(),
        "Storage directories ready",
    );

    // --- Database ---
    let pool = stillcast_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    stillcast_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    stillcast_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    // --- Startup recovery (before any executor exists) ---
    let recovered = recover_orphaned_jobs(&pool)
        .await
        .context("Startup recovery failed")?;
    if recovered > 0 {
        tracing::warn!(recovered, "Orphaned jobs marked as error");
    }

    // --- Dispatcher ---
    let transcoder = Arc::new(FfmpegTranscoder::new(
        &config.ffmpeg_bin,
        &config.ffprobe_bin,
    ));
    let executor = Executor::new(pool.clone(), layout.clone(), transcoder);
    let (dispatch_handle, dispatch_queue) = dispatch_channel(config.dispatch_queue_capacity);
    let dispatcher = JobDispatcher::new(executor, config.worker_concurrency);
    let executors = dispatcher.tracker();
    let dispatch_cancel = CancellationToken::new();
    let dispatcher_handle = tokio::spawn(dispatcher.run(dispatch_queue, dispatch_cancel.clone()));

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        layout,
        dispatcher: dispatch_handle,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining executors");

    dispatch_cancel.cancel();
    let _ = dispatcher_handle.await;

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, executors.wait()).await.is_err() {
        tracing::warn!(
            still_running = executors.len(),
            "Executors still running after shutdown timeout; their jobs stay in progress"
        );
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
