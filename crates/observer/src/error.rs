/// Errors from the observer's HTTP client and local cache.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The HTTP request itself failed, or the body was not the expected JSON.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("cache file is invalid: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
