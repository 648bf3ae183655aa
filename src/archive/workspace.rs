//! # Staging Workspace
//!
//! Where sources live before they are linked into the element store, and
//! where generated files (ACL attachments) are written.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{ArchiveError, ArchiveResult};

const FILE_SCHEME: &str = "file://";

/// Staging area for element sources
pub trait Workspace: Send + Sync + std::fmt::Debug {
    /// Resolve a URI to a local file
    fn get(&self, uri: &str) -> ArchiveResult<PathBuf>;

    /// Write a generated file and return its URI
    fn put(
        &self,
        collection: &str,
        element_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> ArchiveResult<String>;
}

/// Workspace rooted at a local directory
#[derive(Debug)]
pub struct DirectoryWorkspace {
    root: PathBuf,
}

impl DirectoryWorkspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, uri: &str) -> PathBuf {
        match uri.strip_prefix(FILE_SCHEME) {
            Some(path) => PathBuf::from(path),
            None => self.root.join(uri.trim_start_matches('/')),
        }
    }
}

impl Workspace for DirectoryWorkspace {
    fn get(&self, uri: &str) -> ArchiveResult<PathBuf> {
        let path = self.local_path(uri);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ArchiveError::SourceNotFound(uri.to_string()))
        }
    }

    fn put(
        &self,
        collection: &str,
        element_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> ArchiveResult<String> {
        let dir = self.root.join(collection).join(element_id);
        fs::create_dir_all(&dir)
            .map_err(|e| ArchiveError::io(format!("cannot create {}", dir.display()), e))?;

        // Archived copies may be hard links to a previous file at this path
        let path = dir.join(file_name);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| ArchiveError::io(format!("cannot replace {}", path.display()), e))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| ArchiveError::io(format!("cannot write {}", path.display()), e))?;

        Ok(format!("{}{}", FILE_SCHEME, path.display()))
    }
}
