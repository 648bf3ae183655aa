//! # JSON Document File
//!
//! A whole-document JSON file. Writes go to a sibling temp file that is
//! synced and renamed over the target, so a reader sees either the previous
//! or the new document.

use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::{PersistenceError, PersistenceResult};

/// JSON file holding one document of type `T`
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, or `T::default()` when the file is missing or empty.
    pub fn load(&self) -> PersistenceResult<T> {
        if !self.path.exists() {
            return Ok(T::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            PersistenceError::Io(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            PersistenceError::Corrupt(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Replace the document on disk.
    pub fn save(&self, document: &T) -> PersistenceResult<()> {
        let content = serde_json::to_vec_pretty(document)
            .map_err(|e| PersistenceError::Io(format!("failed to serialize document: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Io(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&content)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PersistenceError::Io(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}
