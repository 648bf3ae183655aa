//! # Collaborator Interfaces
//!
//! External services the engine propagates ACL changes to. Each fails
//! independently; failures surface as [`AclServiceError`] and abort the
//! current apply call.
//!
//! [`AclServiceError`]: super::errors::AclServiceError

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::AclResult;
use super::model::AccessControlList;
use crate::archive::MediaPackage;
use crate::jobs::Job;

/// Secondary index serving published media packages
pub trait SearchIndex: Send + Sync {
    fn find_by_id(&self, id: &str) -> AclResult<Option<MediaPackage>>;

    fn find_by_series(&self, series_id: &str) -> AclResult<Vec<MediaPackage>>;

    /// Add or replace a media package
    fn add(&self, mp: &MediaPackage) -> AclResult<Job>;
}

/// Publishes single elements to a channel.
///
/// A finished distribution job may carry the distributed [`Element`] as its
/// JSON payload.
///
/// [`Element`]: crate::archive::Element
pub trait DistributionService: Send + Sync {
    fn distribute(&self, channel: &str, mp: &MediaPackage, element_id: &str) -> AclResult<Job>;

    fn retract(&self, channel: &str, mp: &MediaPackage, element_id: &str) -> AclResult<Job>;
}

/// Series metadata service
pub trait SeriesService: Send + Sync {
    /// `false` when the series does not exist
    fn update_access_control(&self, series_id: &str, acl: &AccessControlList) -> AclResult<bool>;
}

/// Workflow definition plus its configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredWorkflowRef {
    pub workflow_id: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ConfiguredWorkflowRef {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Starts follow-up workflows; the engine never waits for them
pub trait WorkflowService: Send + Sync {
    fn start(&self, workflow: &ConfiguredWorkflowRef, unit_ids: &[String]) -> AclResult<()>;
}
