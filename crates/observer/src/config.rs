use std::path::PathBuf;
use std::time::Duration;

/// Default server base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default location of the local job cache.
pub const DEFAULT_CACHE_PATH: &str = ".stillcast/jobs.json";

/// Fixed interval between two status requests for the same job.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Observer configuration.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Server base URL without a trailing slash.
    pub base_url: String,
    /// JSON file holding the local job cache.
    pub cache_path: PathBuf,
    pub poll_interval: Duration,
}

impl ObserverConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default                 |
    /// |-------------------|-------------------------|
    /// | `STILLCAST_URL`   | `http://localhost:3000` |
    /// | `STILLCAST_CACHE` | `.stillcast/jobs.json`  |
    pub fn from_env() -> Self {
        let base_url = std::env::var("STILLCAST_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let cache_path = std::env::var("STILLCAST_CACHE")
            .unwrap_or_else(|_| DEFAULT_CACHE_PATH.into())
            .into();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_path,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            cache_path: DEFAULT_CACHE_PATH.into(),
            poll_interval: POLL_INTERVAL,
        }
    }
}
