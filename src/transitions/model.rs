//! # Transition Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::retry::RetryState;
use crate::acl::{ConfiguredWorkflowRef, ManagedAclId};

/// Identifier shared by episode and series transitions
pub type TransitionId = u64;

/// Scheduled ACL change of one episode. No ACL means delete the episode ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeAclTransition {
    pub transition_id: TransitionId,
    pub organization: String,
    pub episode_id: String,
    pub application_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_id: Option<ManagedAclId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<ConfiguredWorkflowRef>,
    pub done: bool,
    #[serde(default)]
    pub retry: RetryState,
}

/// Scheduled ACL change of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesAclTransition {
    pub transition_id: TransitionId,
    pub organization: String,
    pub series_id: String,
    pub application_date: DateTime<Utc>,
    pub acl_id: ManagedAclId,
    /// Strip episode ACLs of every member first
    #[serde(rename = "override")]
    pub is_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<ConfiguredWorkflowRef>,
    pub done: bool,
    #[serde(default)]
    pub retry: RetryState,
}

/// Fields of a new episode transition
#[derive(Debug, Clone)]
pub struct NewEpisodeTransition {
    pub organization: String,
    pub episode_id: String,
    pub application_date: DateTime<Utc>,
    pub acl_id: Option<ManagedAclId>,
    pub workflow: Option<ConfiguredWorkflowRef>,
}

/// Fields of a new series transition
#[derive(Debug, Clone)]
pub struct NewSeriesTransition {
    pub organization: String,
    pub series_id: String,
    pub application_date: DateTime<Utc>,
    pub acl_id: ManagedAclId,
    pub is_override: bool,
    pub workflow: Option<ConfiguredWorkflowRef>,
}

impl NewEpisodeTransition {
    pub(crate) fn into_transition(self, transition_id: TransitionId) -> EpisodeAclTransition {
        EpisodeAclTransition {
            transition_id,
            organization: self.organization,
            episode_id: self.episode_id,
            application_date: self.application_date,
            acl_id: self.acl_id,
            workflow: self.workflow,
            done: false,
            retry: RetryState::default(),
        }
    }
}

impl NewSeriesTransition {
    pub(crate) fn into_transition(self, transition_id: TransitionId) -> SeriesAclTransition {
        SeriesAclTransition {
            transition_id,
            organization: self.organization,
            series_id: self.series_id,
            application_date: self.application_date,
            acl_id: self.acl_id,
            is_override: self.is_override,
            workflow: self.workflow,
            done: false,
            retry: RetryState::default(),
        }
    }
}

/// Episode and series transitions matching one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub episode_transitions: Vec<EpisodeAclTransition>,
    pub series_transitions: Vec<SeriesAclTransition>,
}

impl TransitionResult {
    pub fn is_empty(&self) -> bool {
        self.episode_transitions.is_empty() && self.series_transitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.episode_transitions.len() + self.series_transitions.len()
    }
}
