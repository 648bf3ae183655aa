//! # Job
//!
//! Asynchronous work items started by the search index and the distribution
//! service. The engine only ever observes their status.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::JobResult;

/// Job identifier assigned by the registry
pub type JobId = u64;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Instantiated,
    Queued,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job will not change status anymore
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Instantiated => "INSTANTIATED",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Operation name, e.g. `distribute`
    pub operation: String,
    /// Serialized result, set by some operations once finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Job {
    pub fn new(id: JobId, operation: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id,
            status,
            operation: operation.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Source of job status snapshots
pub trait JobRegistry: Send + Sync {
    fn job(&self, id: JobId) -> JobResult<Job>;
}
