use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use stillcast_core::ffmpeg::FfmpegError;
use stillcast_core::job::JobId;
use stillcast_core::storage::StorageLayout;
use stillcast_db::models::job::NewJob;
use stillcast_db::repositories::JobRepo;
use stillcast_db::DbPool;
use stillcast_pipeline::JobTicket;

/// How the fake engine behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    FailProbe,
    /// Write a truncated output, then fail.
    FailEncode,
}

/// Transcoder that never spawns a process.
pub struct FakeTranscoder {
    pub behaviour: Behaviour,
    pub encodes: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            encodes: AtomicUsize::new(0),
        })
    }

    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl stillcast_pipeline::Transcoder for FakeTranscoder {
    async fn probe_duration(&self, audio: &Path) -> Result<f64, FfmpegError> {
        if !audio.exists() {
            return Err(FfmpegError::InputNotFound(audio.display().to_string()));
        }
        match self.behaviour {
            Behaviour::FailProbe => Err(FfmpegError::InvalidDuration),
            _ => Ok(12.5),
        }
    }

    async fn encode(
        &self,
        _audio: &Path,
        _image: &Path,
        output: &Path,
        _duration_secs: f64,
    ) -> Result<(), FfmpegError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::FailEncode => {
                tokio::fs::write(output, b"partial").await?;
                Err(FfmpegError::ExecutionFailed {
                    exit_code: Some(1),
                    stderr: "Invalid data found when processing input".into(),
                })
            }
            _ => {
                tokio::fs::write(output, b"\x00\x00\x00\x18ftypmp42").await?;
                Ok(())
            }
        }
    }
}

pub async fn test_pool() -> DbPool {
    let pool = stillcast_db::create_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("in-memory pool");
    stillcast_db::run_migrations(&pool).await.expect("migrations");
    pool
}

/// Stage two inputs on disk and create their `progress` record.
pub async fn staged_job(pool: &DbPool, layout: &StorageLayout) -> JobTicket {
    let job_id = JobId::new();
    let audio = format!("song-{}.mp3", job_id.short());
    let image = format!("cover-{}.jpg", job_id.short());
    tokio::fs::write(layout.upload_path(&audio), b"ID3").await.unwrap();
    tokio::fs::write(layout.upload_path(&image), b"\xff\xd8\xff").await.unwrap();

    JobRepo::create(
        pool,
        &NewJob {
            id: job_id,
            title: "song".into(),
            audio_file_name: audio.clone(),
            image_file_name: image.clone(),
        },
    )
    .await
    .unwrap();

    JobTicket {
        job_id,
        audio_file_name: audio,
        image_file_name: image,
        output_file_name: format!("song_2024-05-01_10-20-30_{}.mp4", job_id.short()),
    }
}
