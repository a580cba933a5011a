pub mod downloads;
pub mod jobs;
