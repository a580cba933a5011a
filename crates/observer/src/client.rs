//! REST client for the stillcast server.
//!
//! Wraps the job endpoints (submission, listing, lookup) and video
//! downloads using [`reqwest`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_core::media;
use stillcast_core::storage;
use stillcast_core::types::Timestamp;
use tokio::io::AsyncWriteExt;

use crate::error::ObserverError;

/// A job as reported by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJob {
    pub id: JobId,
    pub status: JobStatus,
    pub title: String,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Response of a successful submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub id: JobId,
    pub status: JobStatus,
    pub title: String,
    /// Absent when the server could not store the preview.
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Read access to the authoritative job store.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Every job the server knows, in one request.
    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ObserverError>;

    /// One job by id. An unknown id is an error like any other.
    async fn get_job(&self, id: &JobId) -> Result<RemoteJob, ObserverError>;

    /// Link under which a finished video can be fetched.
    fn download_link(&self, output_file_name: &str) -> String {
        storage::download_url(output_file_name)
    }
}

/// HTTP client for one stillcast server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// * `base_url` - e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute download URL of a generated video, percent-encoded.
    pub fn download_url(&self, output_file_name: &str) -> Result<reqwest::Url, ObserverError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ObserverError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ObserverError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("downloads")
            .push(output_file_name);
        Ok(url)
    }

    /// Upload an audio file and a cover image as a new job.
    ///
    /// Media types are derived from the file extensions.
    pub async fn submit(&self, audio: &Path, image: &Path) -> Result<SubmitResponse, ObserverError> {
        let form = reqwest::multipart::Form::new()
            .part("audio", file_part(audio).await?)
            .part("image", file_part(image).await?);

        let response = self
            .client
            .post(format!("{}/api/v1/jobs", self.base_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_data(response).await
    }

    /// Download a generated video into `dest_dir`. Returns the written path.
    pub async fn download(
        &self,
        output_file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ObserverError> {
        let response = self
            .client
            .get(self.download_url(output_file_name)?)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(output_file_name);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise return
    /// an [`ObserverError::Status`] with the body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ObserverError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ObserverError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Check the status and unwrap the `{ "data": ... }` envelope.
    async fn parse_data<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ObserverError> {
        let response = Self::ensure_success(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl JobSource for ApiClient {
    async fn list_jobs(&self) -> Result<Vec<RemoteJob>, ObserverError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs", self.base_url))
            .send()
            .await?;
        Self::parse_data(response).await
    }

    async fn get_job(&self, id: &JobId) -> Result<RemoteJob, ObserverError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{id}", self.base_url))
            .send()
            .await?;
        Self::parse_data(response).await
    }

    fn download_link(&self, output_file_name: &str) -> String {
        match self.download_url(output_file_name) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base_url, storage::download_url(output_file_name)),
        }
    }
}

async fn file_part(path: &Path) -> Result<reqwest::multipart::Part, ObserverError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let content_type = media::content_type_for_extension(&file_name);
    let bytes = tokio::fs::read(path).await?;

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(content_type)?;
    Ok(part)
}
