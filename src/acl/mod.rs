//! # Access Control
//!
//! ACL model, managed ACLs, ACL attachments of media packages and the
//! transition engine propagating ACL changes to the archive, the search
//! index and the distribution channel.

mod attachments;
mod collaborators;
pub mod errors;
mod model;
mod service;
mod store;

pub use attachments::AclAttachments;
pub use collaborators::{
    ConfiguredWorkflowRef, DistributionService, SearchIndex, SeriesService, WorkflowService,
};
pub use errors::{AclResult, AclServiceError};
pub use model::{AccessControlEntry, AccessControlList, AclScope, ManagedAcl, ManagedAclId};
pub use service::{AclCollaborators, AclService, AclServiceSettings, AclStores};
pub use store::{FileAclStore, ManagedAclStore, MemAclStore};
