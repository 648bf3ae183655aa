//! Shared fakes for the integration tests
//!
//! Every collaborator keeps what it received and can be told to fail, so
//! tests can break propagation after any step.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arcvault::acl::{
    AccessControlEntry, AccessControlList, AclAttachments, AclCollaborators, AclResult,
    AclService, AclServiceError, AclServiceSettings, AclStores, ConfiguredWorkflowRef,
    DistributionService, MemAclStore, SearchIndex, SeriesService, WorkflowService,
};
use arcvault::archive::{
    Archive, ArchiveError, ArchiveResult, DirectoryWorkspace, Element, ElementKind,
    FileSystemElementStore, MediaPackage, MemClaimStore, VersionAllocator, VersionedArchive,
};
use arcvault::jobs::{Job, JobError, JobId, JobRegistry, JobResult, JobStatus};
use arcvault::transitions::{MemTransitionStore, RetryPolicy};
use tempfile::TempDir;

pub const ORG: &str = "o1";
pub const CHANNEL: &str = "engage-player";

// =============================================================================
// Job registry
// =============================================================================

#[derive(Default)]
pub struct FakeJobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
    last_id: AtomicU64,
}

impl FakeJobRegistry {
    /// Register a job that will report `status`; the returned snapshot is
    /// still queued so the barrier has to poll it.
    pub fn create(&self, operation: &str, status: JobStatus, payload: Option<String>) -> Job {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut job = Job::new(id, operation, status);
        job.payload = payload;
        self.jobs.lock().unwrap().insert(id, job);
        Job::new(id, operation, JobStatus::Queued)
    }
}

impl JobRegistry for FakeJobRegistry {
    fn job(&self, id: JobId) -> JobResult<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }
}

// =============================================================================
// Archive
// =============================================================================

/// Versioned archive that can be told to reject writes
pub struct FlakyArchive {
    pub inner: VersionedArchive,
    pub fail_write: AtomicBool,
    pub reject_write: AtomicBool,
    pub writes: AtomicUsize,
}

impl Archive for FlakyArchive {
    fn find_latest(&self, id: &str) -> ArchiveResult<Option<MediaPackage>> {
        self.inner.find_latest(id)
    }

    fn find_latest_by_series(&self, series_id: &str) -> ArchiveResult<Vec<MediaPackage>> {
        self.inner.find_latest_by_series(series_id)
    }

    fn write(&self, mp: &MediaPackage) -> ArchiveResult<MediaPackage> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(ArchiveError::Io("injected write failure".into()));
        }
        if self.reject_write.load(Ordering::SeqCst) {
            return Err(ArchiveError::Unauthorized(mp.id.clone()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(mp)
    }
}

// =============================================================================
// Search index
// =============================================================================

pub struct FakeSearchIndex {
    jobs: Arc<FakeJobRegistry>,
    entries: Mutex<BTreeMap<String, MediaPackage>>,
    pub fail_add: AtomicBool,
    pub add_status: Mutex<JobStatus>,
    pub adds: AtomicUsize,
}

impl FakeSearchIndex {
    fn new(jobs: Arc<FakeJobRegistry>) -> Self {
        Self {
            jobs,
            entries: Mutex::new(BTreeMap::new()),
            fail_add: AtomicBool::new(false),
            add_status: Mutex::new(JobStatus::Finished),
            adds: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, mp: MediaPackage) {
        self.entries.lock().unwrap().insert(mp.id.clone(), mp);
    }

    pub fn remove(&self, id: &str) {
        self.entries.lock().unwrap().remove(id);
    }

    pub fn get(&self, id: &str) -> Option<MediaPackage> {
        self.entries.lock().unwrap().get(id).cloned()
    }
}

impl SearchIndex for FakeSearchIndex {
    fn find_by_id(&self, id: &str) -> AclResult<Option<MediaPackage>> {
        Ok(self.get(id))
    }

    fn find_by_series(&self, series_id: &str) -> AclResult<Vec<MediaPackage>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|mp| mp.series_id.as_deref() == Some(series_id))
            .cloned()
            .collect())
    }

    fn add(&self, mp: &MediaPackage) -> AclResult<Job> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(AclServiceError::Collaborator("search index unavailable".into()));
        }
        self.adds.fetch_add(1, Ordering::SeqCst);
        let status = *self.add_status.lock().unwrap();
        if status == JobStatus::Finished {
            self.insert(mp.clone());
        }
        Ok(self.jobs.create("add", status, None))
    }
}

// =============================================================================
// Distribution
// =============================================================================

type Hook = Box<dyn FnOnce() + Send>;

pub struct FakeDistribution {
    jobs: Arc<FakeJobRegistry>,
    before_distribute: Mutex<Option<Hook>>,
    pub fail: AtomicBool,
    pub job_status: Mutex<JobStatus>,
    pub distributed: Mutex<Vec<(String, String)>>,
    pub retracted: Mutex<Vec<(String, String)>>,
}

impl FakeDistribution {
    fn new(jobs: Arc<FakeJobRegistry>) -> Self {
        Self {
            jobs,
            before_distribute: Mutex::new(None),
            fail: AtomicBool::new(false),
            job_status: Mutex::new(JobStatus::Finished),
            distributed: Mutex::new(Vec::new()),
            retracted: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` once, at the start of the next `distribute` call
    pub fn before_next_distribute(&self, f: impl FnOnce() + Send + 'static) {
        *self.before_distribute.lock().unwrap() = Some(Box::new(f));
    }

    pub fn distributed(&self) -> Vec<(String, String)> {
        self.distributed.lock().unwrap().clone()
    }

    pub fn retracted(&self) -> Vec<(String, String)> {
        self.retracted.lock().unwrap().clone()
    }
}

impl DistributionService for FakeDistribution {
    fn distribute(&self, channel: &str, mp: &MediaPackage, element_id: &str) -> AclResult<Job> {
        let hook = self.before_distribute.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AclServiceError::Collaborator("distribution unavailable".into()));
        }
        let element = mp
            .element(element_id)
            .ok_or_else(|| AclServiceError::NotFound(element_id.to_string()))?;
        let published = Element {
            uri: format!("http://engage/{}/{}/{}.json", channel, mp.id, element_id),
            ..element.clone()
        };
        self.distributed
            .lock()
            .unwrap()
            .push((mp.id.clone(), element_id.to_string()));

        let status = *self.job_status.lock().unwrap();
        let payload = serde_json::to_string(&published).unwrap();
        Ok(self.jobs.create("distribute", status, Some(payload)))
    }

    fn retract(&self, _channel: &str, mp: &MediaPackage, element_id: &str) -> AclResult<Job> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AclServiceError::Collaborator("distribution unavailable".into()));
        }
        self.retracted
            .lock()
            .unwrap()
            .push((mp.id.clone(), element_id.to_string()));
        let status = *self.job_status.lock().unwrap();
        Ok(self.jobs.create("retract", status, None))
    }
}

// =============================================================================
// Series and workflows
// =============================================================================

#[derive(Default)]
pub struct FakeSeriesService {
    known: Mutex<HashSet<String>>,
    acls: Mutex<HashMap<String, AccessControlList>>,
    pub fail: AtomicBool,
}

impl FakeSeriesService {
    pub fn create(&self, series_id: &str) {
        self.known.lock().unwrap().insert(series_id.to_string());
    }

    pub fn acl(&self, series_id: &str) -> Option<AccessControlList> {
        self.acls.lock().unwrap().get(series_id).cloned()
    }
}

impl SeriesService for FakeSeriesService {
    fn update_access_control(&self, series_id: &str, acl: &AccessControlList) -> AclResult<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AclServiceError::Collaborator("series service unavailable".into()));
        }
        if !self.known.lock().unwrap().contains(series_id) {
            return Ok(false);
        }
        self.acls
            .lock()
            .unwrap()
            .insert(series_id.to_string(), acl.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeWorkflowService {
    pub started: Mutex<Vec<(String, Vec<String>)>>,
    pub fail: AtomicBool,
}

impl WorkflowService for FakeWorkflowService {
    fn start(&self, workflow: &ConfiguredWorkflowRef, unit_ids: &[String]) -> AclResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AclServiceError::Collaborator("workflow service unavailable".into()));
        }
        self.started
            .lock()
            .unwrap()
            .push((workflow.workflow_id.clone(), unit_ids.to_vec()));
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub temp: TempDir,
    pub archive: Arc<FlakyArchive>,
    pub search: Arc<FakeSearchIndex>,
    pub distribution: Arc<FakeDistribution>,
    pub jobs: Arc<FakeJobRegistry>,
    pub series: Arc<FakeSeriesService>,
    pub workflows: Arc<FakeWorkflowService>,
    pub transitions: Arc<MemTransitionStore>,
    pub acls: Arc<MemAclStore>,
    pub attachments: AclAttachments,
    pub service: Arc<AclService>,
}

pub fn test_settings(organization: &str) -> AclServiceSettings {
    AclServiceSettings {
        organization: organization.to_string(),
        distribution_channel: CHANNEL.to_string(),
        job_timeout: Duration::from_millis(200),
        job_poll_interval: Duration::from_millis(1),
        retry: RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(600)),
    }
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let workspace = Arc::new(DirectoryWorkspace::new(temp.path().join("workspace")));
        let store = Arc::new(
            FileSystemElementStore::open(temp.path().join("archive"), workspace.clone()).unwrap(),
        );
        let archive = Arc::new(FlakyArchive {
            inner: VersionedArchive::new(
                ORG,
                store.clone(),
                VersionAllocator::new(Arc::new(MemClaimStore::new())),
                temp.path().join("manifests"),
            ),
            fail_write: AtomicBool::new(false),
            reject_write: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        });

        let jobs = Arc::new(FakeJobRegistry::default());
        let search = Arc::new(FakeSearchIndex::new(jobs.clone()));
        let distribution = Arc::new(FakeDistribution::new(jobs.clone()));
        let series = Arc::new(FakeSeriesService::default());
        let workflows = Arc::new(FakeWorkflowService::default());
        let transitions = Arc::new(MemTransitionStore::new());
        let acls = Arc::new(MemAclStore::new());
        let attachments = AclAttachments::new(workspace).with_store(store);

        let service = Arc::new(AclService::new(
            test_settings(ORG),
            AclCollaborators {
                archive: archive.clone(),
                search: search.clone(),
                distribution: distribution.clone(),
                jobs: jobs.clone(),
                series: series.clone(),
                workflows: workflows.clone(),
            },
            AclStores {
                transitions: transitions.clone(),
                acls: acls.clone(),
            },
            attachments.clone(),
        ));

        Self {
            temp,
            archive,
            search,
            distribution,
            jobs,
            series,
            workflows,
            transitions,
            acls,
            attachments,
            service,
        }
    }

    /// A second engine over the same collaborators and stores, acting for
    /// another organization
    pub fn service_for(&self, organization: &str) -> AclService {
        AclService::new(
            test_settings(organization),
            AclCollaborators {
                archive: self.archive.clone(),
                search: self.search.clone(),
                distribution: self.distribution.clone(),
                jobs: self.jobs.clone(),
                series: self.series.clone(),
                workflows: self.workflows.clone(),
            },
            AclStores {
                transitions: self.transitions.clone(),
                acls: self.acls.clone(),
            },
            self.attachments.clone(),
        )
    }

    /// Archive and publish an episode with one track
    pub fn ingest(&self, id: &str, series_id: Option<&str>) -> MediaPackage {
        let inbox = self.temp.path().join("workspace/inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        let file = format!("{}.mp4", id);
        std::fs::write(inbox.join(&file), format!("video of {}", id)).unwrap();

        let mut mp = MediaPackage::new(id).with_element(Element::new(
            "track",
            ElementKind::Track,
            "presenter/source",
            format!("inbox/{}", file),
        ));
        if let Some(series_id) = series_id {
            mp = mp.with_series(series_id);
        }

        let archived = self.archive.inner.write(&mp).unwrap();
        self.search.insert(archived.clone());
        archived
    }

    pub fn writes(&self) -> usize {
        self.archive.writes.load(Ordering::SeqCst)
    }

    pub fn archived(&self, id: &str) -> MediaPackage {
        self.archive.find_latest(id).unwrap().unwrap()
    }

    /// Episode ACL attachments of the archived and the published package
    pub fn episode_acl_counts(&self, id: &str) -> (usize, usize) {
        use arcvault::acl::AclScope;
        let archived = self.attachments.acl_attachments(&self.archived(id), AclScope::Episode);
        let published = self
            .search
            .get(id)
            .map(|mp| self.attachments.acl_attachments(&mp, AclScope::Episode).len())
            .unwrap_or(0);
        (archived.len(), published)
    }

    pub fn create_acl(&self, name: &str, role: &str) -> arcvault::acl::ManagedAcl {
        self.service
            .create_acl(name, &acl_for(role))
            .unwrap()
            .unwrap()
    }
}

pub fn acl_for(role: &str) -> AccessControlList {
    AccessControlList::default()
        .with_entry(AccessControlEntry::new(role, "read", true))
        .with_entry(AccessControlEntry::new(role, "write", false))
}
