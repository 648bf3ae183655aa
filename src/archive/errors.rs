//! # Archive Errors

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Archive and element store errors
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    // Store errors
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Storage path {dir} contains multiple files for asset {asset}")]
    DuplicateAsset { dir: String, asset: String },

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    // Lookup
    #[error("Media package not found: {0}")]
    NotFound(String),

    // Permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ArchiveError {
    /// Whether this is a store-level failure (I/O, linking, corruption, persistence)
    pub fn is_store_error(&self) -> bool {
        !matches!(self, ArchiveError::NotFound(_) | ArchiveError::Unauthorized(_))
    }

    pub(crate) fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        ArchiveError::Io(format!("{}: {}", context, err))
    }
}
