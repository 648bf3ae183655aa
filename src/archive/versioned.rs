//! # Versioned Archive
//!
//! Media packages written to the archive get a fresh version under the
//! content unit's lock:
//!
//! 1. Claim the next version
//! 2. Carry archived elements forward (`copy`), link new ones in (`put`)
//! 3. Rewrite element URIs to `archive://` locators
//! 4. Append the manifest
//!
//! A failure before step 4 removes the partially written version directory.
//! The claimed number is not reused.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::claims::VersionAllocator;
use super::element_store::{ElementStore, ElementStream};
use super::errors::{ArchiveError, ArchiveResult};
use super::mediapackage::MediaPackage;
use super::path::{DeletionSelector, Source, StoragePath};
use super::version::Version;
use crate::lock::ResourceLock;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::persistence::JsonFile;

/// Archive contract consumed by the ACL engine
pub trait Archive: Send + Sync {
    /// Latest version of a media package
    fn find_latest(&self, id: &str) -> ArchiveResult<Option<MediaPackage>>;

    /// Latest version of every media package of a series
    fn find_latest_by_series(&self, series_id: &str) -> ArchiveResult<Vec<MediaPackage>>;

    /// Store a new version; returns the archived representation
    fn write(&self, mp: &MediaPackage) -> ArchiveResult<MediaPackage>;
}

/// Archive over an element store, a version allocator and manifest files
#[derive(Debug)]
pub struct VersionedArchive {
    organization: String,
    store: Arc<dyn ElementStore>,
    allocator: VersionAllocator,
    locks: ResourceLock<String>,
    manifest_dir: PathBuf,
}

impl VersionedArchive {
    pub fn new(
        organization: impl Into<String>,
        store: Arc<dyn ElementStore>,
        allocator: VersionAllocator,
        manifest_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            organization: organization.into(),
            store,
            allocator,
            locks: ResourceLock::new(),
            manifest_dir: manifest_dir.as_ref().to_path_buf(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Every archived version of a media package, oldest first
    pub fn versions(&self, id: &str) -> ArchiveResult<Vec<MediaPackage>> {
        Ok(self.manifest(id)?.load()?)
    }

    /// Open one element of one version
    pub fn get_element(
        &self,
        id: &str,
        version: Version,
        element_id: &str,
    ) -> ArchiveResult<Option<ElementStream>> {
        self.store
            .get(&StoragePath::new(&self.organization, id, version, element_id))
    }

    /// Remove every version of a media package
    pub fn delete(&self, id: &str) -> ArchiveResult<bool> {
        let manifest = self.manifest(id)?;
        self.locks.with_lock(&id.to_string(), || {
            let removed = self
                .store
                .delete(&DeletionSelector::all(&self.organization, id))?;
            match fs::remove_file(manifest.path()) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(removed),
                Err(e) => Err(ArchiveError::io(
                    format!("cannot remove {}", manifest.path().display()),
                    e,
                )),
            }
        })
    }

    fn manifest(&self, id: &str) -> ArchiveResult<JsonFile<Vec<MediaPackage>>> {
        // Validates the id as a path segment
        StoragePath::new(&self.organization, id, Version::FIRST, "manifest").validate()?;
        Ok(JsonFile::new(self.manifest_dir.join(format!("{}.json", id))))
    }

    fn write_locked(&self, mp: &MediaPackage) -> ArchiveResult<MediaPackage> {
        let manifest = self.manifest(&mp.id)?;
        let version = self.allocator.claim_next(&mp.id)?;

        let result = self.store_elements(mp, version).and_then(|archived| {
            let mut history = manifest.load()?;
            history.push(archived.clone());
            manifest.save(&history)?;
            Ok(archived)
        });

        if result.is_err() {
            let partial = DeletionSelector::version(&self.organization, &mp.id, version);
            if let Err(e) = self.store.delete(&partial) {
                let dir = format!("{}/{}/{}", self.organization, mp.id, version);
                Logger::error(
                    Event::ElementStoreFailed.as_str(),
                    &[
                        ("dir", dir.as_str()),
                        ("error", e.to_string().as_str()),
                        ("mediapackage", mp.id.as_str()),
                        ("stage", "cleanup"),
                    ],
                );
            }
        }
        result
    }

    fn store_elements(&self, mp: &MediaPackage, version: Version) -> ArchiveResult<MediaPackage> {
        let mut archived = mp.clone();
        archived.version = Some(version);

        for element in archived.elements.iter_mut() {
            let target = StoragePath::new(&self.organization, &mp.id, version, &element.id);

            match StoragePath::from_uri(&element.uri) {
                Some(from) => {
                    if from.organization_id != self.organization {
                        return Err(ArchiveError::Unauthorized(format!(
                            "element {} belongs to organization {}",
                            element.id, from.organization_id
                        )));
                    }
                    if !self.store.copy(&from, &target)? {
                        return Err(ArchiveError::SourceNotFound(element.uri.clone()));
                    }
                }
                None => self.store.put(&target, &Source::new(element.uri.as_str()))?,
            }
            element.uri = target.to_uri();
        }
        Ok(archived)
    }
}

impl Archive for VersionedArchive {
    fn find_latest(&self, id: &str) -> ArchiveResult<Option<MediaPackage>> {
        Ok(self.versions(id)?.pop())
    }

    fn find_latest_by_series(&self, series_id: &str) -> ArchiveResult<Vec<MediaPackage>> {
        let entries = match fs::read_dir(&self.manifest_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ArchiveError::io(
                    format!("cannot list {}", self.manifest_dir.display()),
                    e,
                ))
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ArchiveError::io("cannot list manifests", e))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let latest = JsonFile::<Vec<MediaPackage>>::new(&path).load()?.pop();
            if let Some(mp) = latest {
                if mp.series_id.as_deref() == Some(series_id) {
                    found.push(mp);
                }
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn write(&self, mp: &MediaPackage) -> ArchiveResult<MediaPackage> {
        let archived = self
            .locks
            .with_lock(&mp.id, || self.write_locked(mp))
            .map_err(|e| {
                Logger::error(
                    Event::ElementStoreFailed.as_str(),
                    &[("mediapackage", mp.id.as_str()), ("error", e.to_string().as_str())],
                );
                e
            })?;

        let version = archived
            .version
            .map(|v| v.to_string())
            .unwrap_or_default();
        log_event_with_fields(
            Event::ArchiveWrite,
            &[
                ("elements", archived.elements.len().to_string().as_str()),
                ("mediapackage", archived.id.as_str()),
                ("version", version.as_str()),
            ],
        );
        Ok(archived)
    }
}
