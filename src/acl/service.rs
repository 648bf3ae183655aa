//! # ACL Transition Engine
//!
//! Applies ACL changes to episodes and series and keeps the archive, the
//! search index and the distribution channel converging on the same state.
//!
//! ## Episode propagation
//!
//! 1. Write a new archive version with the episode ACL set or removed
//! 2. Distribute (or retract) the ACL attachment of the published package
//! 3. Re-add the published package to the search index
//! 4. Mark the transition done
//!
//! Every step is idempotent and awaited before the next one starts. A
//! failure aborts the call and leaves the transition undone, so the whole
//! sequence can be re-run.
//!
//! ## Exclusivity
//!
//! Series application and the episode application of any series member
//! run under the same per-series lock. An episode outside any series is
//! locked on its own id.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::attachments::AclAttachments;
use super::collaborators::{
    ConfiguredWorkflowRef, DistributionService, SearchIndex, SeriesService, WorkflowService,
};
use super::errors::{AclResult, AclServiceError};
use super::model::{AccessControlList, AclScope, ManagedAcl, ManagedAclId};
use super::store::ManagedAclStore;
use crate::archive::{Archive, Element, MediaPackage};
use crate::jobs::{CancellationToken, Job, JobBarrier, JobError, JobRegistry};
use crate::lock::ResourceLock;
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};
use crate::transitions::{
    EpisodeAclTransition, NewEpisodeTransition, NewSeriesTransition, RetryPolicy, RetryState,
    SeriesAclTransition, TransitionId, TransitionQuery, TransitionResult, TransitionStore,
};

/// External services the engine propagates to
#[derive(Clone)]
pub struct AclCollaborators {
    pub archive: Arc<dyn Archive>,
    pub search: Arc<dyn SearchIndex>,
    pub distribution: Arc<dyn DistributionService>,
    pub jobs: Arc<dyn JobRegistry>,
    pub series: Arc<dyn SeriesService>,
    pub workflows: Arc<dyn WorkflowService>,
}

/// Persistence used by the engine
#[derive(Debug, Clone)]
pub struct AclStores {
    pub transitions: Arc<dyn TransitionStore>,
    pub acls: Arc<dyn ManagedAclStore>,
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct AclServiceSettings {
    /// Organization the engine acts for
    pub organization: String,
    pub distribution_channel: String,
    pub job_timeout: Duration,
    pub job_poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for AclServiceSettings {
    fn default() -> Self {
        Self {
            organization: "mh_default_org".to_string(),
            distribution_channel: "engage-player".to_string(),
            job_timeout: Duration::from_secs(60),
            job_poll_interval: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }
}

/// The ACL transition engine
pub struct AclService {
    settings: AclServiceSettings,
    collaborators: AclCollaborators,
    stores: AclStores,
    attachments: AclAttachments,
    cancellation: CancellationToken,
    unit_locks: ResourceLock<String>,
}

impl AclService {
    pub fn new(
        settings: AclServiceSettings,
        collaborators: AclCollaborators,
        stores: AclStores,
        attachments: AclAttachments,
    ) -> Self {
        Self {
            settings,
            collaborators,
            stores,
            attachments,
            cancellation: CancellationToken::new(),
            unit_locks: ResourceLock::new(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.settings.organization
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.settings.retry
    }

    /// Cancelling this token interrupts every job barrier of the engine
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    // ========== Immediate application ==========

    /// Set (`Some`) or delete (`None`) the episode ACL. `Ok(false)` when the
    /// episode is not archived; nothing is written in that case.
    pub fn apply_acl_to_episode(
        &self,
        episode_id: &str,
        acl: Option<&AccessControlList>,
        workflow: Option<&ConfiguredWorkflowRef>,
    ) -> AclResult<bool> {
        let current = match self.collaborators.archive.find_latest(episode_id)? {
            Some(mp) => mp,
            None => return Ok(false),
        };

        let key = match &current.series_id {
            Some(series_id) => series_lock_key(series_id),
            None => episode_lock_key(episode_id),
        };
        let applied = self
            .unit_locks
            .with_lock(&key, || self.apply_episode_locked(episode_id, acl))
            .map_err(|e| self.log_apply_failure("episode", episode_id, e))?;

        if applied {
            let action = if acl.is_some() { "set" } else { "delete" };
            log_event_with_fields(
                Event::EpisodeAclApplied,
                &[("action", action), ("episode", episode_id)],
            );
            if let Some(workflow) = workflow {
                self.start_workflow(workflow, &[episode_id.to_string()]);
            }
        }
        Ok(applied)
    }

    /// Apply a series ACL. With `is_override`, episode ACLs of every member
    /// are stripped first. `Ok(false)` when the series does not exist.
    pub fn apply_acl_to_series(
        &self,
        series_id: &str,
        acl: &AccessControlList,
        is_override: bool,
        workflow: Option<&ConfiguredWorkflowRef>,
    ) -> AclResult<bool> {
        let applied = self
            .unit_locks
            .with_lock(&series_lock_key(series_id), || {
                self.apply_series_locked(series_id, acl, is_override)
            })
            .map_err(|e| self.log_apply_failure("series", series_id, e))?;

        if applied {
            let override_flag = is_override.to_string();
            log_event_with_fields(
                Event::SeriesAclApplied,
                &[("override", override_flag.as_str()), ("series", series_id)],
            );
            if let Some(workflow) = workflow {
                match self.collaborators.archive.find_latest_by_series(series_id) {
                    Ok(members) => {
                        let ids: Vec<String> = members.into_iter().map(|mp| mp.id).collect();
                        self.start_workflow(workflow, &ids);
                    }
                    Err(e) => log_event_at(
                        Severity::Warn,
                        Event::WorkflowFailed,
                        &[("error", e.to_string().as_str()), ("series", series_id)],
                    ),
                }
            }
        }
        Ok(applied)
    }

    /// ACL currently in effect for an archived episode
    pub fn active_episode_acl(&self, episode_id: &str) -> AclResult<Option<AccessControlList>> {
        match self.collaborators.archive.find_latest(episode_id)? {
            Some(mp) => self.attachments.active_acl(&mp),
            None => Err(AclServiceError::NotFound(format!("episode {}", episode_id))),
        }
    }

    fn apply_episode_locked(
        &self,
        episode_id: &str,
        acl: Option<&AccessControlList>,
    ) -> AclResult<bool> {
        // Re-read under the lock
        let archived = match self.collaborators.archive.find_latest(episode_id)? {
            Some(mp) => mp,
            None => return Ok(false),
        };

        match acl {
            Some(acl) => {
                let (updated, _) = self.attachments.set_acl(&archived, AclScope::Episode, acl)?;
                self.collaborators.archive.write(&updated)?;

                match self.collaborators.search.find_by_id(episode_id)? {
                    Some(published) => self.publish_episode_acl(&published, acl)?,
                    None => self.log_search_missing(episode_id),
                }
            }
            None => {
                let updated = self.attachments.remove_acl(&archived, AclScope::Episode);
                self.collaborators.archive.write(&updated)?;

                match self.collaborators.search.find_by_id(episode_id)? {
                    Some(published) => self.retract_episode_acl(&published)?,
                    None => self.log_search_missing(episode_id),
                }
            }
        }
        Ok(true)
    }

    fn apply_series_locked(
        &self,
        series_id: &str,
        acl: &AccessControlList,
        is_override: bool,
    ) -> AclResult<bool> {
        if is_override {
            for archived in self.collaborators.archive.find_latest_by_series(series_id)? {
                if !self.attachments.acl_attachments(&archived, AclScope::Episode).is_empty() {
                    let updated = self.attachments.remove_acl(&archived, AclScope::Episode);
                    self.collaborators.archive.write(&updated)?;
                }
            }
            for published in self.collaborators.search.find_by_series(series_id)? {
                if !self.attachments.acl_attachments(&published, AclScope::Episode).is_empty() {
                    self.retract_episode_acl(&published)?;
                }
            }
        }
        self.collaborators.series.update_access_control(series_id, acl)
    }

    /// Distribute the new episode ACL attachment and re-index
    fn publish_episode_acl(&self, published: &MediaPackage, acl: &AccessControlList) -> AclResult<()> {
        let (mut published, attachment) =
            self.attachments.set_acl(published, AclScope::Episode, acl)?;

        let job = self.collaborators.distribution.distribute(
            &self.settings.distribution_channel,
            &published,
            &attachment.id,
        )?;
        let original_id = attachment.id.clone();
        let distributed = self.await_distributed(job, attachment)?;
        splice(&mut published, &original_id, distributed);

        let job = self.collaborators.search.add(&published)?;
        self.await_jobs(vec![job])
    }

    /// Retract every episode ACL attachment and re-index without them
    fn retract_episode_acl(&self, published: &MediaPackage) -> AclResult<()> {
        for attachment in self.attachments.acl_attachments(published, AclScope::Episode) {
            let job = self.collaborators.distribution.retract(
                &self.settings.distribution_channel,
                published,
                &attachment.id,
            )?;
            self.await_jobs(vec![job])?;
        }

        let stripped = self.attachments.remove_acl(published, AclScope::Episode);
        let job = self.collaborators.search.add(&stripped)?;
        self.await_jobs(vec![job])
    }

    fn await_jobs(&self, jobs: Vec<Job>) -> AclResult<()> {
        let result = JobBarrier::new(self.collaborators.jobs.as_ref(), jobs)
            .with_timeout(self.settings.job_timeout)
            .with_poll_interval(self.settings.job_poll_interval)
            .with_cancellation(self.cancellation.clone())
            .wait_for_jobs();

        if result.is_success() {
            return Ok(());
        }
        match result.first_unfinished() {
            Some((job, status)) => Err(AclServiceError::JobFailed { job, status }),
            None => Err(AclServiceError::Internal("job barrier interrupted".to_string())),
        }
    }

    /// Await a distribution job and read the distributed element from its
    /// payload, falling back to the submitted one.
    fn await_distributed(&self, job: Job, submitted: Element) -> AclResult<Element> {
        let job_id = job.id;
        self.await_jobs(vec![job])?;

        match self.collaborators.jobs.job(job_id)?.payload {
            Some(payload) => serde_json::from_str(&payload).map_err(|e| {
                JobError::InvalidPayload {
                    job: job_id,
                    reason: e.to_string(),
                }
                .into()
            }),
            None => Ok(submitted),
        }
    }

    fn start_workflow(&self, workflow: &ConfiguredWorkflowRef, unit_ids: &[String]) {
        if let Err(e) = self.collaborators.workflows.start(workflow, unit_ids) {
            log_event_at(
                Severity::Warn,
                Event::WorkflowFailed,
                &[
                    ("error", e.to_string().as_str()),
                    ("units", unit_ids.join(",").as_str()),
                    ("workflow", workflow.workflow_id.as_str()),
                ],
            );
        }
    }

    fn log_search_missing(&self, episode_id: &str) {
        log_event_at(Severity::Warn, Event::SearchMissing, &[("episode", episode_id)]);
    }

    fn log_apply_failure(&self, scope: &str, target: &str, e: AclServiceError) -> AclServiceError {
        log_event_with_fields(
            Event::AclApplyFailed,
            &[
                ("error", e.to_string().as_str()),
                ("scope", scope),
                ("target", target),
            ],
        );
        e
    }

    // ========== Transitions ==========

    /// Schedule an episode ACL change. No ACL id schedules a deletion.
    pub fn add_episode_transition(
        &self,
        episode_id: &str,
        managed_acl_id: Option<ManagedAclId>,
        application_date: DateTime<Utc>,
        workflow: Option<ConfiguredWorkflowRef>,
    ) -> AclResult<EpisodeAclTransition> {
        if let Some(id) = managed_acl_id {
            self.require_acl(id)?;
        }
        Ok(self.stores.transitions.add_episode_transition(NewEpisodeTransition {
            organization: self.settings.organization.clone(),
            episode_id: episode_id.to_string(),
            application_date,
            acl_id: managed_acl_id,
            workflow,
        })?)
    }

    /// Schedule a series ACL change
    pub fn add_series_transition(
        &self,
        series_id: &str,
        managed_acl_id: ManagedAclId,
        application_date: DateTime<Utc>,
        is_override: bool,
        workflow: Option<ConfiguredWorkflowRef>,
    ) -> AclResult<SeriesAclTransition> {
        self.require_acl(managed_acl_id)?;
        Ok(self.stores.transitions.add_series_transition(NewSeriesTransition {
            organization: self.settings.organization.clone(),
            series_id: series_id.to_string(),
            application_date,
            acl_id: managed_acl_id,
            is_override,
            workflow,
        })?)
    }

    /// Reschedule an episode transition. Attempt bookkeeping starts over.
    pub fn update_episode_transition(
        &self,
        transition_id: TransitionId,
        managed_acl_id: Option<ManagedAclId>,
        application_date: DateTime<Utc>,
        workflow: Option<ConfiguredWorkflowRef>,
    ) -> AclResult<EpisodeAclTransition> {
        self.episode_transition(transition_id)?;
        if let Some(id) = managed_acl_id {
            self.require_acl(id)?;
        }
        self.modify_episode_transition(transition_id, &mut |t| {
            t.acl_id = managed_acl_id;
            t.application_date = application_date;
            t.workflow = workflow.clone();
            t.retry.reset();
        })
    }

    /// Reschedule a series transition. Attempt bookkeeping starts over.
    pub fn update_series_transition(
        &self,
        transition_id: TransitionId,
        managed_acl_id: ManagedAclId,
        application_date: DateTime<Utc>,
        is_override: bool,
        workflow: Option<ConfiguredWorkflowRef>,
    ) -> AclResult<SeriesAclTransition> {
        self.series_transition(transition_id)?;
        self.require_acl(managed_acl_id)?;
        self.modify_series_transition(transition_id, &mut |t| {
            t.acl_id = managed_acl_id;
            t.application_date = application_date;
            t.is_override = is_override;
            t.workflow = workflow.clone();
            t.retry.reset();
        })
    }

    pub fn delete_episode_transition(&self, transition_id: TransitionId) -> AclResult<()> {
        self.episode_transition(transition_id)?;
        self.stores.transitions.delete_episode_transition(transition_id)?;
        Ok(())
    }

    pub fn delete_series_transition(&self, transition_id: TransitionId) -> AclResult<()> {
        self.series_transition(transition_id)?;
        self.stores.transitions.delete_series_transition(transition_id)?;
        Ok(())
    }

    /// Delete every transition of an episode; returns how many were removed
    pub fn delete_episode_transitions(&self, episode_id: &str) -> AclResult<usize> {
        let query = TransitionQuery::new()
            .with_target_id(episode_id)
            .with_scope(AclScope::Episode);
        let mut removed = 0;
        for t in self.get_transitions(&query)?.episode_transitions {
            if self.stores.transitions.delete_episode_transition(t.transition_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every transition of a series; returns how many were removed
    pub fn delete_series_transitions(&self, series_id: &str) -> AclResult<usize> {
        let query = TransitionQuery::new()
            .with_target_id(series_id)
            .with_scope(AclScope::Series);
        let mut removed = 0;
        for t in self.get_transitions(&query)?.series_transitions {
            if self.stores.transitions.delete_series_transition(t.transition_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Transitions of this organization matching `query`
    pub fn get_transitions(&self, query: &TransitionQuery) -> AclResult<TransitionResult> {
        Ok(self
            .stores
            .transitions
            .find(&self.settings.organization, query)?)
    }

    pub fn mark_episode_transition_as_completed(
        &self,
        transition_id: TransitionId,
    ) -> AclResult<EpisodeAclTransition> {
        self.episode_transition(transition_id)?;
        let t = self.modify_episode_transition(transition_id, &mut |t| t.done = true)?;
        self.log_completed(transition_id, "episode", &t.episode_id);
        Ok(t)
    }

    pub fn mark_series_transition_as_completed(
        &self,
        transition_id: TransitionId,
    ) -> AclResult<SeriesAclTransition> {
        self.series_transition(transition_id)?;
        let t = self.modify_series_transition(transition_id, &mut |t| t.done = true)?;
        self.log_completed(transition_id, "series", &t.series_id);
        Ok(t)
    }

    /// Apply a stored episode transition and mark it done.
    ///
    /// A failure is recorded on the transition and counts against its
    /// attempts. An unarchived episode is recorded as a failure and yields
    /// `Ok(false)`.
    pub fn apply_episode_acl_transition(&self, transition_id: TransitionId) -> AclResult<bool> {
        let t = self.episode_transition(transition_id)?;

        let outcome = self
            .resolve_optional_acl(t.acl_id)
            .and_then(|acl| {
                self.apply_acl_to_episode(&t.episode_id, acl.as_ref(), t.workflow.as_ref())
            });

        match outcome {
            Ok(true) => {
                self.mark_episode_transition_as_completed(transition_id)?;
                Ok(true)
            }
            Ok(false) => {
                let missing = AclServiceError::NotFound(format!("episode {}", t.episode_id));
                self.record_episode_failure(transition_id, &missing);
                Ok(false)
            }
            Err(e) => {
                self.record_episode_failure(transition_id, &e);
                Err(e)
            }
        }
    }

    /// Apply a stored series transition and mark it done.
    ///
    /// Failures are recorded as for episode transitions.
    pub fn apply_series_acl_transition(&self, transition_id: TransitionId) -> AclResult<bool> {
        let t = self.series_transition(transition_id)?;

        let outcome = self.require_acl(t.acl_id).and_then(|managed| {
            self.apply_acl_to_series(&t.series_id, &managed.acl, t.is_override, t.workflow.as_ref())
        });

        match outcome {
            Ok(true) => {
                self.mark_series_transition_as_completed(transition_id)?;
                Ok(true)
            }
            Ok(false) => {
                let missing = AclServiceError::NotFound(format!("series {}", t.series_id));
                self.record_series_failure(transition_id, &missing);
                Ok(false)
            }
            Err(e) => {
                self.record_series_failure(transition_id, &e);
                Err(e)
            }
        }
    }

    fn episode_transition(&self, transition_id: TransitionId) -> AclResult<EpisodeAclTransition> {
        let t = self
            .stores
            .transitions
            .episode_transition(transition_id)?
            .ok_or_else(|| {
                AclServiceError::NotFound(format!("episode transition {}", transition_id))
            })?;
        self.check_organization(&t.organization, transition_id)?;
        Ok(t)
    }

    fn series_transition(&self, transition_id: TransitionId) -> AclResult<SeriesAclTransition> {
        let t = self
            .stores
            .transitions
            .series_transition(transition_id)?
            .ok_or_else(|| {
                AclServiceError::NotFound(format!("series transition {}", transition_id))
            })?;
        self.check_organization(&t.organization, transition_id)?;
        Ok(t)
    }

    fn check_organization(&self, organization: &str, transition_id: TransitionId) -> AclResult<()> {
        if organization != self.settings.organization {
            return Err(AclServiceError::Unauthorized(format!(
                "transition {} belongs to organization {}",
                transition_id, organization
            )));
        }
        Ok(())
    }

    fn modify_episode_transition(
        &self,
        transition_id: TransitionId,
        f: &mut dyn FnMut(&mut EpisodeAclTransition),
    ) -> AclResult<EpisodeAclTransition> {
        self.stores
            .transitions
            .modify_episode_transition(transition_id, f)?
            .ok_or_else(|| AclServiceError::NotFound(format!("episode transition {}", transition_id)))
    }

    fn modify_series_transition(
        &self,
        transition_id: TransitionId,
        f: &mut dyn FnMut(&mut SeriesAclTransition),
    ) -> AclResult<SeriesAclTransition> {
        self.stores
            .transitions
            .modify_series_transition(transition_id, f)?
            .ok_or_else(|| AclServiceError::NotFound(format!("series transition {}", transition_id)))
    }

    /// Count a failed attempt against the stored transition. Only the retry
    /// state is touched; a transition completed or removed in the meantime
    /// is left alone.
    fn record_episode_failure(&self, transition_id: TransitionId, err: &AclServiceError) {
        let mut abandoned = None;
        let recorded = self.stores.transitions.modify_episode_transition(transition_id, &mut |t| {
            if !t.done {
                abandoned = Some(self.count_failure(&mut t.retry, err));
            }
        });
        match (recorded, abandoned) {
            (Ok(Some(t)), Some(abandoned)) => self.log_transition_failure(
                transition_id,
                &t.episode_id,
                t.retry.attempts,
                abandoned,
                err,
            ),
            (Ok(_), _) => self.log_failure_not_recorded(transition_id, err),
            (Err(e), _) => self.log_bookkeeping_failure(transition_id, &e.to_string()),
        }
    }

    fn record_series_failure(&self, transition_id: TransitionId, err: &AclServiceError) {
        let mut abandoned = None;
        let recorded = self.stores.transitions.modify_series_transition(transition_id, &mut |t| {
            if !t.done {
                abandoned = Some(self.count_failure(&mut t.retry, err));
            }
        });
        match (recorded, abandoned) {
            (Ok(Some(t)), Some(abandoned)) => self.log_transition_failure(
                transition_id,
                &t.series_id,
                t.retry.attempts,
                abandoned,
                err,
            ),
            (Ok(_), _) => self.log_failure_not_recorded(transition_id, err),
            (Err(e), _) => self.log_bookkeeping_failure(transition_id, &e.to_string()),
        }
    }

    fn count_failure(&self, retry: &mut RetryState, err: &AclServiceError) -> bool {
        retry.record_failure(
            Utc::now(),
            err.to_string(),
            &self.settings.retry,
            err.is_unauthorized(),
        )
    }

    fn log_failure_not_recorded(&self, transition_id: TransitionId, err: &AclServiceError) {
        log_event_at(
            Severity::Warn,
            Event::TransitionFailed,
            &[
                ("error", err.to_string().as_str()),
                ("stage", "already_settled"),
                ("transition", transition_id.to_string().as_str()),
            ],
        );
    }

    fn log_transition_failure(
        &self,
        transition_id: TransitionId,
        target: &str,
        attempts: u32,
        abandoned: bool,
        err: &AclServiceError,
    ) {
        let event = if abandoned {
            Event::TransitionAbandoned
        } else {
            Event::TransitionFailed
        };
        let severity = if abandoned { Severity::Error } else { Severity::Warn };
        log_event_at(
            severity,
            event,
            &[
                ("attempts", attempts.to_string().as_str()),
                ("error", err.to_string().as_str()),
                ("target", target),
                ("transition", transition_id.to_string().as_str()),
            ],
        );
    }

    fn log_bookkeeping_failure(&self, transition_id: TransitionId, error: &str) {
        log_event_at(
            Severity::Error,
            Event::TransitionFailed,
            &[
                ("error", error),
                ("stage", "record_attempt"),
                ("transition", transition_id.to_string().as_str()),
            ],
        );
    }

    fn log_completed(&self, transition_id: TransitionId, scope: &str, target: &str) {
        log_event_with_fields(
            Event::TransitionCompleted,
            &[
                ("scope", scope),
                ("target", target),
                ("transition", transition_id.to_string().as_str()),
            ],
        );
    }

    // ========== Managed ACLs ==========

    pub fn get_acls(&self) -> AclResult<Vec<ManagedAcl>> {
        Ok(self.stores.acls.get_acls(&self.settings.organization)?)
    }

    pub fn get_acl(&self, id: ManagedAclId) -> AclResult<Option<ManagedAcl>> {
        Ok(self.stores.acls.get_acl(&self.settings.organization, id)?)
    }

    /// `Ok(None)` when the name is already taken
    pub fn create_acl(&self, name: &str, acl: &AccessControlList) -> AclResult<Option<ManagedAcl>> {
        let created = self
            .stores
            .acls
            .create_acl(&self.settings.organization, name, acl)?;
        if let Some(created) = &created {
            log_event_with_fields(
                Event::AclCreated,
                &[
                    ("acl", created.id.to_string().as_str()),
                    ("name", created.name.as_str()),
                ],
            );
        }
        Ok(created)
    }

    /// `Ok(false)` when the ACL does not exist or the new name is taken
    pub fn update_acl(&self, acl: &ManagedAcl) -> AclResult<bool> {
        if acl.organization != self.settings.organization {
            return Err(AclServiceError::Unauthorized(format!(
                "ACL {} belongs to organization {}",
                acl.id, acl.organization
            )));
        }
        let previous = self.get_acl(acl.id)?;
        let updated = self.stores.acls.update_acl(acl)?;

        if let (true, Some(previous)) = (updated, previous) {
            if previous.name != acl.name {
                log_event_with_fields(
                    Event::AclRenamed,
                    &[
                        ("acl", acl.id.to_string().as_str()),
                        ("from", previous.name.as_str()),
                        ("to", acl.name.as_str()),
                    ],
                );
            }
        }
        Ok(updated)
    }

    /// Delete a managed ACL. `Ok(false)` while an undone transition
    /// references it; not found when it does not exist.
    pub fn delete_acl(&self, id: ManagedAclId) -> AclResult<bool> {
        let pending = self.get_transitions(&TransitionQuery::new().with_acl_id(id).with_done(false))?;
        if !pending.is_empty() {
            return Ok(false);
        }

        if !self.stores.acls.delete_acl(&self.settings.organization, id)? {
            return Err(AclServiceError::NotFound(format!("ACL {}", id)));
        }
        log_event_with_fields(Event::AclDeleted, &[("acl", id.to_string().as_str())]);
        Ok(true)
    }

    fn require_acl(&self, id: ManagedAclId) -> AclResult<ManagedAcl> {
        self.get_acl(id)?
            .ok_or_else(|| AclServiceError::NotFound(format!("ACL {}", id)))
    }

    fn resolve_optional_acl(&self, id: Option<ManagedAclId>) -> AclResult<Option<AccessControlList>> {
        match id {
            Some(id) => Ok(Some(self.require_acl(id)?.acl)),
            None => Ok(None),
        }
    }
}

fn series_lock_key(series_id: &str) -> String {
    format!("series:{}", series_id)
}

fn episode_lock_key(episode_id: &str) -> String {
    format!("episode:{}", episode_id)
}

/// Replace the element `original_id` in place, appending when absent
fn splice(mp: &mut MediaPackage, original_id: &str, element: Element) {
    match mp.elements.iter_mut().find(|e| e.id == original_id) {
        Some(slot) => *slot = element,
        None => mp.add(element),
    }
}
