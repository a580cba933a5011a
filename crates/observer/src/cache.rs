//! Local persistent job cache.
//!
//! A JSON file listing every job this observer submitted. It lets the job
//! list survive restarts; the server stays authoritative and the cache is
//! corrected from it whenever the two disagree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stillcast_core::job::{JobId, JobStatus};
use stillcast_core::types::Timestamp;

use crate::error::ObserverError;

/// One cached job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: JobId,
    pub status: JobStatus,
    pub title: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Download name, set once the job is finished.
    #[serde(default)]
    pub output_file_name: Option<String>,
    /// When the job was first cached. Used for ordering only; never
    /// changed by later updates.
    pub timestamp: Timestamp,
}

/// The cache file and its in-memory entries.
#[derive(Debug)]
pub struct LocalCache {
    path: PathBuf,
    entries: Vec<CacheEntry>,
}

impl LocalCache {
    /// Empty cache backed by `path`, without touching the file.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Load the cache from `path`.
    ///
    /// A missing file is an empty cache. An unreadable or invalid file is
    /// logged and also treated as empty; it is overwritten on next flush.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_entries(&path).await {
            Ok(entries) => Self { path, entries },
            Err(ObserverError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::empty(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable job cache");
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &JobId) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, newest timestamp first.
    pub fn entries_newest_first(&self) -> Vec<CacheEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Insert a new entry or replace the one with the same id.
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Record a newly observed status. The timestamp is kept.
    ///
    /// Returns `false` when the entry is unknown or already matches.
    pub fn update_status(
        &mut self,
        id: &JobId,
        status: JobStatus,
        output_file_name: Option<String>,
    ) -> bool {
        match self.entries.iter_mut().find(|e| &e.id == id) {
            Some(entry)
                if entry.status != status || entry.output_file_name != output_file_name =>
            {
                entry.status = status;
                entry.output_file_name = output_file_name;
                true
            }
            _ => false,
        }
    }

    /// Write all entries to the cache file, creating its directory.
    ///
    /// The file is replaced atomically so a crash never leaves half a cache.
    pub async fn flush(&self) -> Result<(), ObserverError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn read_entries(path: &Path) -> Result<Vec<CacheEntry>, ObserverError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
