//! Job entity models and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use stillcast_core::job::{JobId, JobStatus};
use stillcast_core::types::Timestamp;

use crate::error::StoreError;

/// A raw row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub title: String,
    pub audio_file_name: String,
    pub image_file_name: String,
    pub output_file_name: Option<String>,
    pub created_at: Timestamp,
}

/// A job record as exposed to the rest of the system.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub title: String,
    pub audio_file_name: String,
    pub image_file_name: String,
    pub output_file_name: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse::<JobId>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Corrupt(format!("job {id}: {e}")))?;

        if (status == JobStatus::Finished) != row.output_file_name.is_some() {
            return Err(StoreError::Corrupt(format!(
                "job {id}: status {status} with output {:?}",
                row.output_file_name
            )));
        }

        Ok(Job {
            id,
            status,
            title: row.title,
            audio_file_name: row.audio_file_name,
            image_file_name: row.image_file_name,
            output_file_name: row.output_file_name,
            created_at: row.created_at,
        })
    }
}

/// DTO for inserting a new job. The store sets status and `created_at`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub title: String,
    pub audio_file_name: String,
    pub image_file_name: String,
}
