//! # ACL Attachments
//!
//! ACLs travel with a media package as JSON attachments flavored
//! `security/xacml+episode` or `security/xacml+series`. Each scope uses a
//! fixed element id so that re-applying an ACL redistributes the same
//! element.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use super::errors::{AclResult, AclServiceError};
use super::model::{AccessControlList, AclScope};
use crate::archive::{
    ArchiveError, Element, ElementKind, ElementStore, MediaPackage, StoragePath, Workspace,
};

/// Reads and writes ACL attachments of media packages
#[derive(Debug, Clone)]
pub struct AclAttachments {
    workspace: Arc<dyn Workspace>,
    store: Option<Arc<dyn ElementStore>>,
}

impl AclAttachments {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self {
            workspace,
            store: None,
        }
    }

    /// Resolve `archive://` attachment URIs through this store
    pub fn with_store(mut self, store: Arc<dyn ElementStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Element id of the attachment for `scope`
    pub fn element_id(scope: AclScope) -> String {
        format!("security-policy-{}", scope)
    }

    /// Attach `acl` at `scope`, replacing previous attachments of that scope.
    /// Returns the updated package and the new attachment.
    pub fn set_acl(
        &self,
        mp: &MediaPackage,
        scope: AclScope,
        acl: &AccessControlList,
    ) -> AclResult<(MediaPackage, Element)> {
        let bytes = serde_json::to_vec_pretty(acl)
            .map_err(|e| AclServiceError::Internal(format!("cannot serialize ACL: {}", e)))?;

        let element_id = Self::element_id(scope);
        let file_name = format!("xacml-{}.json", scope);
        let uri = self.workspace.put(&mp.id, &element_id, &file_name, &bytes)?;

        let attachment = Element::new(element_id, ElementKind::Attachment, scope.flavor(), uri);
        let mut updated = self.remove_acl(mp, scope);
        updated.add(attachment.clone());
        Ok((updated, attachment))
    }

    /// Copy of `mp` without attachments of `scope`
    pub fn remove_acl(&self, mp: &MediaPackage, scope: AclScope) -> MediaPackage {
        let mut updated = mp.clone();
        updated.elements.retain(|e| e.flavor != scope.flavor());
        updated
    }

    /// Attachments of `scope`
    pub fn acl_attachments(&self, mp: &MediaPackage, scope: AclScope) -> Vec<Element> {
        mp.elements_by_flavor(scope.flavor())
            .into_iter()
            .cloned()
            .collect()
    }

    /// ACL in effect: the episode ACL if attached, else the series ACL.
    pub fn active_acl(&self, mp: &MediaPackage) -> AclResult<Option<AccessControlList>> {
        for scope in [AclScope::Episode, AclScope::Series] {
            if let Some(attachment) = self.acl_attachments(mp, scope).first() {
                return self.read_acl(attachment).map(Some);
            }
        }
        Ok(None)
    }

    fn read_acl(&self, attachment: &Element) -> AclResult<AccessControlList> {
        let bytes = self.read_uri(&attachment.uri)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AclServiceError::Internal(format!("malformed ACL attachment {}: {}", attachment.uri, e))
        })
    }

    fn read_uri(&self, uri: &str) -> AclResult<Vec<u8>> {
        if let (Some(path), Some(store)) = (StoragePath::from_uri(uri), self.store.as_ref()) {
            let mut stream = store
                .get(&path)?
                .ok_or_else(|| AclServiceError::NotFound(uri.to_string()))?;
            let mut bytes = Vec::new();
            stream
                .read_to_end(&mut bytes)
                .map_err(|e| ArchiveError::io(format!("cannot read {}", uri), e))?;
            return Ok(bytes);
        }

        let path = self.workspace.get(uri)?;
        fs::read(&path)
            .map_err(|e| ArchiveError::io(format!("cannot read {}", path.display()), e).into())
    }
}
