//! Lifecycle events emitted by the archive and the ACL engine

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Versioning
    /// A version number was claimed for a content unit
    VersionClaimed,

    // Element store
    /// Element linked or copied in from the workspace
    ElementStored,
    /// Element carried forward into another version
    ElementCopied,
    /// Version subtree removed
    ElementsDeleted,
    /// Element store I/O or linking failure
    ElementStoreFailed,
    /// More than one file matched an asset id
    ElementStoreCorrupted,

    // Archive
    /// Media package version written to the archive
    ArchiveWrite,

    // ACL propagation
    /// ACL applied to an episode
    EpisodeAclApplied,
    /// ACL applied to a series
    SeriesAclApplied,
    /// ACL application failed
    AclApplyFailed,
    /// Episode absent from the search index
    SearchMissing,
    /// A job did not finish inside the barrier
    JobNotFinished,
    /// Follow-up workflow could not be started
    WorkflowFailed,

    // Managed ACLs
    /// Managed ACL created
    AclCreated,
    /// Managed ACL renamed
    AclRenamed,
    /// Managed ACL deleted
    AclDeleted,

    // Transitions
    /// Transition marked done
    TransitionCompleted,
    /// Transition attempt failed
    TransitionFailed,
    /// Transition exhausted its attempts
    TransitionAbandoned,
    /// Scheduling pass started
    ScanBegin,
    /// Scheduling pass finished
    ScanComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::VersionClaimed => "VERSION_CLAIMED",

            Event::ElementStored => "ELEMENT_STORED",
            Event::ElementCopied => "ELEMENT_COPIED",
            Event::ElementsDeleted => "ELEMENTS_DELETED",
            Event::ElementStoreFailed => "ELEMENT_STORE_FAILED",
            Event::ElementStoreCorrupted => "ELEMENT_STORE_CORRUPTED",

            Event::ArchiveWrite => "ARCHIVE_WRITE",

            Event::EpisodeAclApplied => "EPISODE_ACL_APPLIED",
            Event::SeriesAclApplied => "SERIES_ACL_APPLIED",
            Event::AclApplyFailed => "ACL_APPLY_FAILED",
            Event::SearchMissing => "SEARCH_MISSING",
            Event::JobNotFinished => "JOB_NOT_FINISHED",
            Event::WorkflowFailed => "WORKFLOW_FAILED",

            Event::AclCreated => "ACL_CREATED",
            Event::AclRenamed => "ACL_RENAMED",
            Event::AclDeleted => "ACL_DELETED",

            Event::TransitionCompleted => "TRANSITION_COMPLETED",
            Event::TransitionFailed => "TRANSITION_FAILED",
            Event::TransitionAbandoned => "TRANSITION_ABANDONED",
            Event::ScanBegin => "SCAN_BEGIN",
            Event::ScanComplete => "SCAN_COMPLETE",
        }
    }

    /// Failure events are logged at ERROR
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ElementStoreFailed
                | Event::ElementStoreCorrupted
                | Event::AclApplyFailed
                | Event::TransitionAbandoned
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
