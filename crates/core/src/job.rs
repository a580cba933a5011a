//! Job identity and the job status state machine.
//!
//! A job is created in [`JobStatus::Progress`] and moves exactly once to a
//! terminal status. [`TerminalOutcome`] is the only way to describe that
//! move, so a `finished` job always carries its output name and an `error`
//! job never does.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Opaque job identifier, rendered as a hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex characters, used to keep artifact names unique.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::Validation(format!("Invalid job id: {s}")))
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Progress,
    Finished,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Progress => "progress",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Progress)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Only `progress -> finished` and `progress -> error` are legal.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Progress, JobStatus::Finished) | (JobStatus::Progress, JobStatus::Error)
        )
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progress" => Ok(JobStatus::Progress),
            "finished" => Ok(JobStatus::Finished),
            "error" => Ok(JobStatus::Error),
            _ => Err(CoreError::Validation(format!("Invalid job status: {s}"))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single terminal write an executor performs for its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Finished { output_file_name: String },
    Error,
}

impl TerminalOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            TerminalOutcome::Finished { .. } => JobStatus::Finished,
            TerminalOutcome::Error => JobStatus::Error,
        }
    }

    pub fn output_file_name(&self) -> Option<&str> {
        match self {
            TerminalOutcome::Finished { output_file_name } => Some(output_file_name),
            TerminalOutcome::Error => None,
        }
    }
}
