//! # Media Package
//!
//! The representation of a content unit exchanged with the archive and the
//! search index: an id, an optional series, the archived version and the
//! list of elements.

use serde::{Deserialize, Serialize};

use super::version::Version;

/// Kind of a media package element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Track,
    Catalog,
    Attachment,
}

/// One element of a media package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    /// `type/subtype`, e.g. `security/xacml+episode`
    pub flavor: String,
    pub uri: String,
}

impl Element {
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        flavor: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            flavor: flavor.into(),
            uri: uri.into(),
        }
    }
}

/// A content unit and its elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPackage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    /// Set by the archive on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl MediaPackage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            series_id: None,
            version: None,
            elements: Vec::new(),
        }
    }

    pub fn with_series(mut self, series_id: impl Into<String>) -> Self {
        self.series_id = Some(series_id.into());
        self
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.add(element);
        self
    }

    /// Add an element, replacing one with the same id
    pub fn add(&mut self, element: Element) {
        self.remove(&element.id);
        self.elements.push(element);
    }

    /// Remove an element by id
    pub fn remove(&mut self, element_id: &str) -> Option<Element> {
        let idx = self.elements.iter().position(|e| e.id == element_id)?;
        Some(self.elements.remove(idx))
    }

    pub fn element(&self, element_id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn elements_by_flavor(&self, flavor: &str) -> Vec<&Element> {
        self.elements.iter().filter(|e| e.flavor == flavor).collect()
    }
}
