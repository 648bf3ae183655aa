//! # Storage Paths and Selectors
//!
//! Logical locators for stored elements. The on-disk layout mirrors the
//! fields: `root/organization/content_unit/version/asset[.ext]`.

use std::hash::{Hash, Hasher};
use std::path::Path;

use super::errors::{ArchiveError, ArchiveResult};
use super::version::Version;

/// URI scheme for elements held by the archive
pub const ARCHIVE_URI_SCHEME: &str = "archive://";

/// Locator of one stored element.
///
/// The extension is a storage hint and takes no part in equality.
#[derive(Debug, Clone)]
pub struct StoragePath {
    pub organization_id: String,
    pub content_unit_id: String,
    pub version: Version,
    pub asset_id: String,
    pub extension: Option<String>,
}

impl StoragePath {
    pub fn new(
        organization_id: impl Into<String>,
        content_unit_id: impl Into<String>,
        version: Version,
        asset_id: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            content_unit_id: content_unit_id.into(),
            version,
            asset_id: asset_id.into(),
            extension: None,
        }
    }

    /// Set an explicit file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = non_empty(extension.into());
        self
    }

    /// Reject segments that would escape the store layout
    pub fn validate(&self) -> ArchiveResult<()> {
        validate_segment("organization", &self.organization_id)?;
        validate_segment("content unit", &self.content_unit_id)?;
        validate_segment("asset", &self.asset_id)
    }

    /// `archive://org/unit/version/asset`
    pub fn to_uri(&self) -> String {
        format!(
            "{}{}/{}/{}/{}",
            ARCHIVE_URI_SCHEME,
            self.organization_id,
            self.content_unit_id,
            self.version,
            self.asset_id
        )
    }

    /// Parse an archive URI. Returns `None` for any other URI.
    pub fn from_uri(uri: &str) -> Option<StoragePath> {
        let rest = uri.strip_prefix(ARCHIVE_URI_SCHEME)?;
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [org, unit, version, asset] => {
                let version = version.parse::<Version>().ok()?;
                Some(StoragePath::new(*org, *unit, version, *asset))
            }
            _ => None,
        }
    }
}

impl PartialEq for StoragePath {
    fn eq(&self, other: &Self) -> bool {
        self.organization_id == other.organization_id
            && self.content_unit_id == other.content_unit_id
            && self.version == other.version
            && self.asset_id == other.asset_id
    }
}

impl Eq for StoragePath {}

impl Hash for StoragePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.organization_id.hash(state);
        self.content_unit_id.hash(state);
        self.version.hash(state);
        self.asset_id.hash(state);
    }
}

/// Selects stored elements for bulk removal.
///
/// `version == None` selects every version of the content unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSelector {
    pub organization_id: String,
    pub content_unit_id: String,
    pub version: Option<Version>,
}

impl DeletionSelector {
    /// All versions of a content unit
    pub fn all(organization_id: impl Into<String>, content_unit_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            content_unit_id: content_unit_id.into(),
            version: None,
        }
    }

    /// Exactly one version of a content unit
    pub fn version(
        organization_id: impl Into<String>,
        content_unit_id: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            content_unit_id: content_unit_id.into(),
            version: Some(version),
        }
    }

    pub fn validate(&self) -> ArchiveResult<()> {
        validate_segment("organization", &self.organization_id)?;
        validate_segment("content unit", &self.content_unit_id)
    }
}

/// A staged file to be linked into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub uri: String,
}

impl Source {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Extension of the URI's path component
    pub fn extension(&self) -> Option<String> {
        let without_scheme = match self.uri.find("://") {
            Some(idx) => &self.uri[idx + 3..],
            None => self.uri.as_str(),
        };
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme);
        file_extension(Path::new(path))
    }
}

/// Non-empty extension of a file name
pub(crate) fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| non_empty(ext.to_string()))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_segment(what: &str, value: &str) -> ArchiveResult<()> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0'])
    {
        return Err(ArchiveError::InvalidPath(format!(
            "{} id {:?} is not a valid path segment",
            what, value
        )));
    }
    Ok(())
}
