//! # Transition Query

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{EpisodeAclTransition, SeriesAclTransition, TransitionId};
use crate::acl::{AclScope, ManagedAclId};

/// Filter over stored transitions. Unset fields match everything.
///
/// `after` and `before` are inclusive bounds on the application date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionQuery {
    pub target_id: Option<String>,
    pub scope: Option<AclScope>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub done: Option<bool>,
    pub acl_id: Option<ManagedAclId>,
    pub transition_id: Option<TransitionId>,
}

impl TransitionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_scope(mut self, scope: AclScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn after(mut self, at: DateTime<Utc>) -> Self {
        self.after = Some(at);
        self
    }

    pub fn before(mut self, at: DateTime<Utc>) -> Self {
        self.before = Some(at);
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    pub fn with_acl_id(mut self, acl_id: ManagedAclId) -> Self {
        self.acl_id = Some(acl_id);
        self
    }

    pub fn with_transition_id(mut self, transition_id: TransitionId) -> Self {
        self.transition_id = Some(transition_id);
        self
    }

    pub fn matches_episode(&self, t: &EpisodeAclTransition) -> bool {
        self.scope.map_or(true, |s| s == AclScope::Episode)
            && self.target_id.as_deref().map_or(true, |id| id == t.episode_id)
            && self.acl_id.map_or(true, |id| t.acl_id == Some(id))
            && self.matches_common(t.transition_id, t.application_date, t.done)
    }

    pub fn matches_series(&self, t: &SeriesAclTransition) -> bool {
        self.scope.map_or(true, |s| s == AclScope::Series)
            && self.target_id.as_deref().map_or(true, |id| id == t.series_id)
            && self.acl_id.map_or(true, |id| t.acl_id == id)
            && self.matches_common(t.transition_id, t.application_date, t.done)
    }

    fn matches_common(&self, transition_id: TransitionId, at: DateTime<Utc>, done: bool) -> bool {
        self.transition_id.map_or(true, |id| id == transition_id)
            && self.after.map_or(true, |after| at >= after)
            && self.before.map_or(true, |before| at <= before)
            && self.done.map_or(true, |d| d == done)
    }
}
