//! # ACL Service Errors

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::jobs::{JobError, JobId, JobStatus};
use crate::persistence::PersistenceError;

/// Result type for ACL operations
pub type AclResult<T> = Result<T, AclServiceError>;

/// ACL engine errors
#[derive(Debug, Clone, Error)]
pub enum AclServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Job registry error: {0}")]
    Job(#[from] JobError),

    #[error("Job {job} ended as {status}")]
    JobFailed { job: JobId, status: JobStatus },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AclServiceError {
    /// Unauthorized failures are surfaced and never retried
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AclServiceError::Unauthorized(_) | AclServiceError::Archive(ArchiveError::Unauthorized(_))
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AclServiceError::NotFound(_))
    }
}
