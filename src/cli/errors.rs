//! CLI-specific error types

use std::fmt;
use std::io;

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::persistence::PersistenceError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// Element store or persistence failure
    StoreError,
    /// Requested element does not exist
    NotFound,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ARCV_CLI_CONFIG_ERROR",
            Self::IoError => "ARCV_CLI_IO_ERROR",
            Self::AlreadyInitialized => "ARCV_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "ARCV_CLI_NOT_INITIALIZED",
            Self::StoreError => "ARCV_CLI_STORE_ERROR",
            Self::NotFound => "ARCV_CLI_NOT_FOUND",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Storage directory already initialized",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Storage directory not initialized. Run 'arcvault init' first.",
        )
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::NotFound, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<ArchiveError> for CliError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound(_) | ArchiveError::SourceNotFound(_) => {
                Self::not_found(e.to_string())
            }
            other => Self::new(CliErrorCode::StoreError, other.to_string()),
        }
    }
}

impl From<PersistenceError> for CliError {
    fn from(e: PersistenceError) -> Self {
        Self::new(CliErrorCode::StoreError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
