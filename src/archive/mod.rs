//! # Archive
//!
//! Versioned element storage for content units.
//!
//! - [`VersionAllocator`] hands out `0, 1, 2, ...` per content unit
//! - [`ElementStore`] keeps element payloads under
//!   `<root>/<org>/<unit>/<version>/<asset>[.<ext>]`
//! - [`VersionedArchive`] ties both together behind the [`Archive`] trait

mod claims;
mod element_store;
pub mod errors;
mod mediapackage;
mod path;
mod version;
mod versioned;
mod workspace;

pub use claims::{ClaimStore, FileClaimStore, MemClaimStore, VersionAllocator};
pub use element_store::{ElementStore, ElementStream, FileSystemElementStore};
pub use errors::{ArchiveError, ArchiveResult};
pub use mediapackage::{Element, ElementKind, MediaPackage};
pub use path::{DeletionSelector, Source, StoragePath, ARCHIVE_URI_SCHEME};
pub use version::Version;
pub use versioned::{Archive, VersionedArchive};
pub use workspace::{DirectoryWorkspace, Workspace};
