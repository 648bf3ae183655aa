//! # Configuration
//!
//! JSON configuration file. Only `storage_dir` is required; directories
//! default to subdirectories of it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acl::AclServiceSettings;
use crate::transitions::RetryPolicy;

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Archive and ACL engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base storage directory (required)
    pub storage_dir: String,

    /// Element store root (default `<storage_dir>/archive`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_root_dir: Option<String>,

    /// Staging area root (default `<storage_dir>/workspace`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<String>,

    /// Persistence files (default `<storage_dir>/state`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,

    #[serde(default = "default_organization")]
    pub organization: String,

    #[serde(default = "default_distribution_channel")]
    pub distribution_channel: String,

    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,

    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    #[serde(default = "default_max_transition_attempts")]
    pub max_transition_attempts: u32,

    #[serde(default = "default_retry_backoff_base_secs")]
    pub retry_backoff_base_secs: u64,

    #[serde(default = "default_retry_backoff_max_secs")]
    pub retry_backoff_max_secs: u64,

    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

fn default_organization() -> String {
    "mh_default_org".to_string()
}
fn default_distribution_channel() -> String {
    "engage-player".to_string()
}
fn default_job_poll_interval_ms() -> u64 {
    100
}
fn default_job_timeout_ms() -> u64 {
    60_000
}
fn default_max_transition_attempts() -> u32 {
    5
}
fn default_retry_backoff_base_secs() -> u64 {
    60
}
fn default_retry_backoff_max_secs() -> u64 {
    3600
}
fn default_scan_interval_secs() -> u64 {
    60
}

impl ArchiveConfig {
    /// Defaults for everything but the storage directory
    pub fn new(storage_dir: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            archive_root_dir: None,
            workspace_dir: None,
            state_dir: None,
            organization: default_organization(),
            distribution_channel: default_distribution_channel(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
            job_timeout_ms: default_job_timeout_ms(),
            max_transition_attempts: default_max_transition_attempts(),
            retry_backoff_base_secs: default_retry_backoff_base_secs(),
            retry_backoff_max_secs: default_retry_backoff_max_secs(),
            scan_interval_secs: default_scan_interval_secs(),
        }
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ArchiveConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_dir must not be empty".into()));
        }
        if self.organization.trim().is_empty() {
            return Err(ConfigError::Invalid("organization must not be empty".into()));
        }
        if self.job_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("job_poll_interval_ms must be > 0".into()));
        }
        if self.job_timeout_ms == 0 {
            return Err(ConfigError::Invalid("job_timeout_ms must be > 0".into()));
        }
        if self.max_transition_attempts == 0 {
            return Err(ConfigError::Invalid("max_transition_attempts must be > 0".into()));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid("scan_interval_secs must be > 0".into()));
        }
        if self.retry_backoff_base_secs > self.retry_backoff_max_secs {
            return Err(ConfigError::Invalid(format!(
                "retry_backoff_base_secs ({}) exceeds retry_backoff_max_secs ({})",
                self.retry_backoff_base_secs, self.retry_backoff_max_secs
            )));
        }
        Ok(())
    }

    pub fn storage_path(&self) -> &Path {
        Path::new(&self.storage_dir)
    }

    pub fn archive_root(&self) -> PathBuf {
        self.dir_or_default(&self.archive_root_dir, "archive")
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.dir_or_default(&self.workspace_dir, "workspace")
    }

    pub fn state_root(&self) -> PathBuf {
        self.dir_or_default(&self.state_dir, "state")
    }

    pub fn claims_path(&self) -> PathBuf {
        self.state_root().join("claims.json")
    }

    /// Lock held across loading, claiming and saving version claims
    pub fn claims_lock_path(&self) -> PathBuf {
        self.state_root().join("claims.lock")
    }

    /// Lock held by element store mutations
    pub fn archive_lock_path(&self) -> PathBuf {
        self.state_root().join("archive.lock")
    }

    pub fn transitions_path(&self) -> PathBuf {
        self.state_root().join("transitions.json")
    }

    pub fn acls_path(&self) -> PathBuf {
        self.state_root().join("acls.json")
    }

    /// Manifests of this organization's media packages
    pub fn manifest_dir(&self) -> PathBuf {
        self.state_root().join("manifests").join(&self.organization)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_transition_attempts,
            Duration::from_secs(self.retry_backoff_base_secs),
            Duration::from_secs(self.retry_backoff_max_secs),
        )
    }

    pub fn acl_settings(&self) -> AclServiceSettings {
        AclServiceSettings {
            organization: self.organization.clone(),
            distribution_channel: self.distribution_channel.clone(),
            job_timeout: Duration::from_millis(self.job_timeout_ms),
            job_poll_interval: Duration::from_millis(self.job_poll_interval_ms),
            retry: self.retry_policy(),
        }
    }

    fn dir_or_default(&self, dir: &Option<String>, name: &str) -> PathBuf {
        match dir {
            Some(dir) => PathBuf::from(dir),
            None => self.storage_path().join(name),
        }
    }
}
