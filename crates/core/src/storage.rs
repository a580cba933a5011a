//! On-disk layout of job artifacts.

use std::path::{Path, PathBuf};

/// Directories holding staged uploads, generated videos and previews.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub uploads_dir: PathBuf,
    pub output_dir: PathBuf,
    pub previews_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        previews_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            output_dir: output_dir.into(),
            previews_dir: previews_dir.into(),
        }
    }

    /// Layout with the three directories nested under `root`.
    pub fn under(root: &Path) -> Self {
        Self::new(
            root.join("uploads"),
            root.join("output"),
            root.join("previews"),
        )
    }

    /// Create any missing directory.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.uploads_dir, &self.output_dir, &self.previews_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn upload_path(&self, file_name: &str) -> PathBuf {
        self.uploads_dir.join(file_name)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn preview_path(&self, file_name: &str) -> PathBuf {
        self.previews_dir.join(file_name)
    }
}

/// URL path under which a preview file is served.
pub fn preview_url(file_name: &str) -> String {
    format!("/previews/{file_name}")
}

/// URL path under which a generated video is downloaded.
pub fn download_url(output_file_name: &str) -> String {
    format!("/downloads/{output_file_name}")
}
