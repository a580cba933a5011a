use stillcast_core::job::JobId;
use stillcast_db::models::job::NewJob;
use stillcast_db::DbPool;

/// Fresh in-memory database with all migrations applied.
pub async fn test_pool() -> DbPool {
    let pool = stillcast_db::create_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("in-memory pool");
    stillcast_db::run_migrations(&pool)
        .await
        .expect("migrations");
    pool
}

/// A new job input with staged names derived from `title`.
pub fn new_job(title: &str) -> NewJob {
    NewJob {
        id: JobId::new(),
        title: title.to_string(),
        audio_file_name: format!("{title}-staged.mp3"),
        image_file_name: format!("{title}-staged.jpg"),
    }
}
