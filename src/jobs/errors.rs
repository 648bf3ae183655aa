//! # Job Errors

use thiserror::Error;

use super::job::JobId;

/// Result type for job operations
pub type JobResult<T> = Result<T, JobError>;

/// Job registry errors
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job registry unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid job payload for job {job}: {reason}")]
    InvalidPayload { job: JobId, reason: String },
}
