//! # Element Store
//!
//! Versioned, path-addressable storage of element payloads.
//!
//! Layout: `root/organization/content_unit/version/asset[.ext]`
//!
//! Invariants:
//! - At most one file per version directory matches an asset id (by stem)
//! - More than one match is corruption and is reported, never resolved
//! - Stored files are never written in place; replacing unlinks first, so
//!   hard links shared between versions stay immutable

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{ArchiveError, ArchiveResult};
use super::path::{file_extension, DeletionSelector, Source, StoragePath};
use super::workspace::Workspace;
use crate::observability::{log_event_with_fields, Event, Logger};

/// Readable element payload
pub type ElementStream = Box<dyn Read + Send>;

/// Storage of element payloads addressed by [`StoragePath`]
pub trait ElementStore: Send + Sync + std::fmt::Debug {
    /// Materialize the source's bytes at `path`
    fn put(&self, path: &StoragePath, source: &Source) -> ArchiveResult<()>;

    /// Duplicate a stored element. `Ok(false)` when `from` does not exist.
    fn copy(&self, from: &StoragePath, to: &StoragePath) -> ArchiveResult<bool>;

    /// Open a stored element
    fn get(&self, path: &StoragePath) -> ArchiveResult<Option<ElementStream>>;

    /// Check existence without opening
    fn contains(&self, path: &StoragePath) -> ArchiveResult<bool>;

    /// Remove the selected subtree. `Ok(false)` when it was already absent.
    fn delete(&self, selector: &DeletionSelector) -> ArchiveResult<bool>;

    /// Bytes stored under the root
    fn used_space(&self) -> Option<u64>;

    /// Bytes available to this process on the root's volume
    fn usable_space(&self) -> Option<u64>;

    /// Size of the root's volume
    fn total_space(&self) -> Option<u64>;
}

/// Element store on the local filesystem
#[derive(Debug)]
pub struct FileSystemElementStore {
    root: PathBuf,
    workspace: Arc<dyn Workspace>,
}

impl FileSystemElementStore {
    /// Open the store, creating the root directory if needed
    pub fn open(root: impl AsRef<Path>, workspace: Arc<dyn Workspace>) -> ArchiveResult<Self> {
        let root = root.as_ref().to_path_buf();
        mk_dirs(&root)?;
        Ok(Self { root, workspace })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, path: &StoragePath) -> PathBuf {
        self.root
            .join(&path.organization_id)
            .join(&path.content_unit_id)
            .join(path.version.to_string())
    }

    fn file_for(&self, path: &StoragePath, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(ext) => format!("{}.{}", path.asset_id, ext),
            None => path.asset_id.clone(),
        };
        self.version_dir(path).join(name)
    }

    fn selector_dir(&self, selector: &DeletionSelector) -> PathBuf {
        let base = self
            .root
            .join(&selector.organization_id)
            .join(&selector.content_unit_id);
        match selector.version {
            Some(version) => base.join(version.to_string()),
            None => base,
        }
    }

    /// The single file stored for `path`, if any
    fn find_file(&self, path: &StoragePath) -> ArchiveResult<Option<PathBuf>> {
        path.validate()?;
        let dir = self.version_dir(path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::io(format!("cannot list {}", dir.display()), e)),
        };

        let mut matches = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ArchiveError::io(format!("cannot list {}", dir.display()), e))?;
            let file = entry.path();
            if file.is_file() && matches_asset(&file, &path.asset_id) {
                matches.push(file);
            }
        }

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => {
                let dir = dir.display().to_string();
                Logger::error(
                    Event::ElementStoreCorrupted.as_str(),
                    &[("dir", dir.as_str()), ("asset", path.asset_id.as_str())],
                );
                Err(ArchiveError::DuplicateAsset {
                    dir,
                    asset: path.asset_id.clone(),
                })
            }
        }
    }

    /// Link `origin` to `destination`, replacing whatever `path` held before
    fn install(
        &self,
        path: &StoragePath,
        origin: &Path,
        destination: &Path,
        existing: Option<PathBuf>,
    ) -> ArchiveResult<()> {
        if let Some(parent) = destination.parent() {
            mk_dirs(parent)?;
        }
        if let Some(stale) = existing {
            remove_file_if_present(&stale)?;
        }
        remove_file_if_present(destination)?;

        link_or_copy(origin, destination).map_err(|e| {
            let origin = origin.display().to_string();
            let destination = destination.display().to_string();
            Logger::error(
                Event::ElementStoreFailed.as_str(),
                &[
                    ("asset", path.asset_id.as_str()),
                    ("destination", destination.as_str()),
                    ("error", e.to_string().as_str()),
                    ("origin", origin.as_str()),
                ],
            );
            ArchiveError::io(format!("cannot link or copy {} to {}", origin, destination), e)
        })
    }
}

impl ElementStore for FileSystemElementStore {
    fn put(&self, path: &StoragePath, source: &Source) -> ArchiveResult<()> {
        path.validate()?;
        let origin = self.workspace.get(&source.uri).map_err(|e| {
            Logger::error(
                Event::ElementStoreFailed.as_str(),
                &[("source", source.uri.as_str()), ("error", e.to_string().as_str())],
            );
            e
        })?;

        let existing = self.find_file(path)?;
        let extension = path
            .extension
            .clone()
            .or_else(|| source.extension())
            .or_else(|| existing.as_deref().and_then(file_extension));
        let destination = self.file_for(path, extension.as_deref());

        self.install(path, &origin, &destination, existing)?;

        log_event_with_fields(
            Event::ElementStored,
            &[
                ("asset", path.asset_id.as_str()),
                ("unit", path.content_unit_id.as_str()),
                ("version", path.version.to_string().as_str()),
            ],
        );
        Ok(())
    }

    fn copy(&self, from: &StoragePath, to: &StoragePath) -> ArchiveResult<bool> {
        to.validate()?;
        let Some(origin) = self.find_file(from)? else {
            return Ok(false);
        };
        if from == to {
            return Ok(true);
        }

        let existing = self.find_file(to)?;
        let extension = to.extension.clone().or_else(|| file_extension(&origin));
        let destination = self.file_for(to, extension.as_deref());

        Logger::trace(
            Event::ElementCopied.as_str(),
            &[
                ("from", origin.display().to_string().as_str()),
                ("to", destination.display().to_string().as_str()),
            ],
        );
        self.install(to, &origin, &destination, existing)?;
        Ok(true)
    }

    fn get(&self, path: &StoragePath) -> ArchiveResult<Option<ElementStream>> {
        match self.find_file(path)? {
            Some(file) => {
                let handle = File::open(&file)
                    .map_err(|e| ArchiveError::io(format!("cannot open {}", file.display()), e))?;
                Ok(Some(Box::new(handle)))
            }
            None => Ok(None),
        }
    }

    fn contains(&self, path: &StoragePath) -> ArchiveResult<bool> {
        Ok(self.find_file(path)?.is_some())
    }

    fn delete(&self, selector: &DeletionSelector) -> ArchiveResult<bool> {
        selector.validate()?;
        let dir = self.selector_dir(selector);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                let version = selector
                    .version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "all".to_string());
                log_event_with_fields(
                    Event::ElementsDeleted,
                    &[
                        ("unit", selector.content_unit_id.as_str()),
                        ("version", version.as_str()),
                    ],
                );
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Logger::error(
                    Event::ElementStoreFailed.as_str(),
                    &[
                        ("dir", dir.display().to_string().as_str()),
                        ("error", e.to_string().as_str()),
                    ],
                );
                Err(ArchiveError::io(format!("cannot delete {}", dir.display()), e))
            }
        }
    }

    fn used_space(&self) -> Option<u64> {
        dir_size(&self.root).ok()
    }

    fn usable_space(&self) -> Option<u64> {
        volume_stats(&self.root).map(|(usable, _)| usable)
    }

    fn total_space(&self) -> Option<u64> {
        volume_stats(&self.root).map(|(_, total)| total)
    }
}

fn matches_asset(file: &Path, asset_id: &str) -> bool {
    let name = file.file_name().and_then(|n| n.to_str());
    let stem = file.file_stem().and_then(|s| s.to_str());
    name == Some(asset_id) || stem == Some(asset_id)
}

/// Hard link when source and destination share a volume, byte copy otherwise
fn link_or_copy(origin: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::hard_link(origin, destination) {
        Ok(()) => Ok(()),
        Err(_) => fs::copy(origin, destination).map(|_| ()),
    }
}

fn remove_file_if_present(file: &Path) -> ArchiveResult<()> {
    match fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::io(format!("cannot remove {}", file.display()), e)),
    }
}

fn mk_dirs(dir: &Path) -> ArchiveResult<()> {
    fs::create_dir_all(dir).map_err(|e| {
        Logger::error(
            Event::ElementStoreFailed.as_str(),
            &[
                ("dir", dir.display().to_string().as_str()),
                ("error", e.to_string().as_str()),
            ],
        );
        ArchiveError::io(format!("cannot create directory {}", dir.display()), e)
    })
}

fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// (usable, total) bytes of the volume holding `path`
#[cfg(unix)]
fn volume_stats(path: &Path) -> Option<(u64, u64)> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stats = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: c_path is NUL-terminated and statvfs only writes into `stats`.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stats.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: statvfs returned 0, so `stats` is initialized.
    let stats = unsafe { stats.assume_init() };
    let fragment = stats.f_frsize as u64;
    Some((
        (stats.f_bavail as u64).saturating_mul(fragment),
        (stats.f_blocks as u64).saturating_mul(fragment),
    ))
}

#[cfg(not(unix))]
fn volume_stats(_path: &Path) -> Option<(u64, u64)> {
    None
}
