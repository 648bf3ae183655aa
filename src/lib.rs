//! arcvault - versioned media archive with cross-service ACL propagation
//!
//! - `archive`: version allocation, element storage, versioned media packages
//! - `acl`: managed ACLs and the transition engine keeping the archive, the
//!   search index and the distribution channel consistent
//! - `transitions`: scheduled ACL changes, bounded retry, scheduling pass
//! - `jobs`: job snapshots and the job barrier
//! - `lock`: keyed mutual exclusion

pub mod acl;
pub mod archive;
pub mod cli;
pub mod config;
pub mod jobs;
pub mod lock;
pub mod observability;
pub mod persistence;
pub mod transitions;
