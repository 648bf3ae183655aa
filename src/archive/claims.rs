//! # Version Claims
//!
//! One persisted `{content_unit_id, last_claimed}` row per content unit.
//!
//! The allocator is not synchronized: callers hold the content unit's
//! [`ResourceLock`](crate::lock::ResourceLock) across claim-then-write.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use super::errors::ArchiveResult;
use super::version::Version;
use crate::observability::{Logger, Event};
use crate::persistence::{JsonFile, PersistenceError, PersistenceResult};

/// Durable storage of the last claimed version per content unit
pub trait ClaimStore: Send + Sync + std::fmt::Debug {
    /// Last claimed version, `None` when nothing was ever claimed
    fn last_claimed(&self, content_unit_id: &str) -> PersistenceResult<Option<Version>>;

    /// Insert or update the claim row
    fn record_claim(&self, content_unit_id: &str, version: Version) -> PersistenceResult<()>;
}

/// Claim store backed by one JSON document
#[derive(Debug)]
pub struct FileClaimStore {
    file: JsonFile<BTreeMap<String, Version>>,
    claims: Mutex<BTreeMap<String, Version>>,
}

impl FileClaimStore {
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let file = JsonFile::new(path);
        let claims = file.load()?;
        Ok(Self {
            file,
            claims: Mutex::new(claims),
        })
    }
}

impl ClaimStore for FileClaimStore {
    fn last_claimed(&self, content_unit_id: &str) -> PersistenceResult<Option<Version>> {
        let claims = self
            .claims
            .lock()
            .map_err(|_| PersistenceError::Poisoned("claims"))?;
        Ok(claims.get(content_unit_id).copied())
    }

    fn record_claim(&self, content_unit_id: &str, version: Version) -> PersistenceResult<()> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| PersistenceError::Poisoned("claims"))?;

        // Only publish the new value once it is on disk
        let mut next = claims.clone();
        next.insert(content_unit_id.to_string(), version);
        self.file.save(&next)?;
        *claims = next;
        Ok(())
    }
}

/// In-memory claim store
#[derive(Debug, Default)]
pub struct MemClaimStore {
    claims: RwLock<HashMap<String, Version>>,
}

impl MemClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStore for MemClaimStore {
    fn last_claimed(&self, content_unit_id: &str) -> PersistenceResult<Option<Version>> {
        let claims = self
            .claims
            .read()
            .map_err(|_| PersistenceError::Poisoned("claims"))?;
        Ok(claims.get(content_unit_id).copied())
    }

    fn record_claim(&self, content_unit_id: &str, version: Version) -> PersistenceResult<()> {
        let mut claims = self
            .claims
            .write()
            .map_err(|_| PersistenceError::Poisoned("claims"))?;
        claims.insert(content_unit_id.to_string(), version);
        Ok(())
    }
}

/// Hands out the next unused version of a content unit
#[derive(Debug, Clone)]
pub struct VersionAllocator {
    store: Arc<dyn ClaimStore>,
}

impl VersionAllocator {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    /// Claim the next version. The first claim for an id yields [`Version::FIRST`].
    pub fn claim_next(&self, content_unit_id: &str) -> ArchiveResult<Version> {
        let next = match self.store.last_claimed(content_unit_id)? {
            Some(last) => last.next(),
            None => Version::FIRST,
        };
        self.store.record_claim(content_unit_id, next)?;

        Logger::trace(
            Event::VersionClaimed.as_str(),
            &[
                ("unit", content_unit_id),
                ("version", next.to_string().as_str()),
            ],
        );
        Ok(next)
    }

    /// Last claimed version without claiming
    pub fn last_claimed(&self, content_unit_id: &str) -> ArchiveResult<Option<Version>> {
        Ok(self.store.last_claimed(content_unit_id)?)
    }
}
