use std::path::PathBuf;

use stillcast_core::storage::StorageLayout;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running transcodes, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// SQLite database URL.
    pub database_url: String,
    /// Staged uploads.
    pub uploads_dir: PathBuf,
    /// Generated videos.
    pub output_dir: PathBuf,
    /// Preview copies of job images, served at `/previews`.
    pub previews_dir: PathBuf,
    /// Maximum number of transcodes running at once (default: `2`).
    pub worker_concurrency: usize,
    /// Jobs accepted but not yet started before submissions get 503 (default: `64`).
    pub dispatch_queue_capacity: usize,
    /// Maximum multipart request body size in bytes (default: 512 MiB).
    pub max_upload_bytes: usize,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                               |
    /// |---------------------------|---------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                             |
    /// | `PORT`                    | `3000`                                |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`               |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                  |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                                  |
    /// | `DATABASE_URL`            | `sqlite://data/stillcast.db?mode=rwc` |
    /// | `UPLOADS_DIR`             | `uploads`                             |
    /// | `OUTPUT_DIR`              | `output`                              |
    /// | `PREVIEWS_DIR`            | `public/previews`                     |
    /// | `WORKER_CONCURRENCY`      | `2`                                   |
    /// | `DISPATCH_QUEUE_CAPACITY` | `64`                                  |
    /// | `MAX_UPLOAD_BYTES`        | `536870912`                           |
    /// | `FFMPEG_BIN`              | `ffmpeg`                              |
    /// | `FFPROBE_BIN`             | `ffprobe`                             |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", "30")
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let worker_concurrency: usize = env_or("WORKER_CONCURRENCY", "2")
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");
        assert!(worker_concurrency > 0, "WORKER_CONCURRENCY must be at least 1");

        let dispatch_queue_capacity: usize = env_or("DISPATCH_QUEUE_CAPACITY", "64")
            .parse()
            .expect("DISPATCH_QUEUE_CAPACITY must be a valid usize");
        assert!(
            dispatch_queue_capacity > 0,
            "DISPATCH_QUEUE_CAPACITY must be at least 1"
        );

        let max_upload_bytes: usize = env_or("MAX_UPLOAD_BYTES", "536870912")
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url: env_or("DATABASE_URL", "sqlite://data/stillcast.db?mode=rwc"),
            uploads_dir: env_or("UPLOADS_DIR", "uploads").into(),
            output_dir: env_or("OUTPUT_DIR", "output").into(),
            previews_dir: env_or("PREVIEWS_DIR", "public/previews").into(),
            worker_concurrency,
            dispatch_queue_capacity,
            max_upload_bytes,
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg").into(),
            ffprobe_bin: env_or("FFPROBE_BIN", "ffprobe").into(),
        }
    }

    /// Artifact directories as a [`StorageLayout`].
    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::new(&self.uploads_dir, &self.output_dir, &self.previews_dir)
    }
}
