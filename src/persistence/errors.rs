//! # Persistence Errors

use thiserror::Error;

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Persistence errors
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt document: {0}")]
    Corrupt(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
}
