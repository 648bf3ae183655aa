//! # Managed ACL Store

use std::path::Path;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use super::model::{AccessControlList, ManagedAcl, ManagedAclId};
use crate::persistence::{JsonFile, PersistenceError, PersistenceResult};

/// Durable storage of managed ACLs, scoped by organization
pub trait ManagedAclStore: Send + Sync + std::fmt::Debug {
    /// All ACLs of an organization, ordered by name
    fn get_acls(&self, organization: &str) -> PersistenceResult<Vec<ManagedAcl>>;

    fn get_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<Option<ManagedAcl>>;

    /// `None` when the organization already has an ACL with this name
    fn create_acl(
        &self,
        organization: &str,
        name: &str,
        acl: &AccessControlList,
    ) -> PersistenceResult<Option<ManagedAcl>>;

    /// `false` when the ACL does not exist or the new name is taken
    fn update_acl(&self, acl: &ManagedAcl) -> PersistenceResult<bool>;

    /// `false` when the ACL does not exist
    fn delete_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<bool>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct AclDocument {
    last_id: ManagedAclId,
    acls: Vec<ManagedAcl>,
}

impl AclDocument {
    fn list(&self, organization: &str) -> Vec<ManagedAcl> {
        let mut acls: Vec<_> = self
            .acls
            .iter()
            .filter(|a| a.organization == organization)
            .cloned()
            .collect();
        acls.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        acls
    }

    fn get(&self, organization: &str, id: ManagedAclId) -> Option<ManagedAcl> {
        self.acls
            .iter()
            .find(|a| a.id == id && a.organization == organization)
            .cloned()
    }

    fn name_taken(&self, organization: &str, name: &str, except: Option<ManagedAclId>) -> bool {
        self.acls.iter().any(|a| {
            a.organization == organization && a.name == name && Some(a.id) != except
        })
    }

    fn create(&mut self, organization: &str, name: &str, acl: &AccessControlList) -> Option<ManagedAcl> {
        if self.name_taken(organization, name, None) {
            return None;
        }
        self.last_id += 1;
        let created = ManagedAcl {
            id: self.last_id,
            organization: organization.to_string(),
            name: name.to_string(),
            acl: acl.clone(),
        };
        self.acls.push(created.clone());
        Some(created)
    }

    fn update(&mut self, acl: &ManagedAcl) -> bool {
        if self.name_taken(&acl.organization, &acl.name, Some(acl.id)) {
            return false;
        }
        match self
            .acls
            .iter_mut()
            .find(|a| a.id == acl.id && a.organization == acl.organization)
        {
            Some(existing) => {
                *existing = acl.clone();
                true
            }
            None => false,
        }
    }

    fn delete(&mut self, organization: &str, id: ManagedAclId) -> bool {
        let before = self.acls.len();
        self.acls
            .retain(|a| !(a.id == id && a.organization == organization));
        self.acls.len() != before
    }
}

/// Managed ACL store backed by one JSON document
#[derive(Debug)]
pub struct FileAclStore {
    file: JsonFile<AclDocument>,
    doc: Mutex<AclDocument>,
}

impl FileAclStore {
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let file = JsonFile::new(path);
        let doc = file.load()?;
        Ok(Self {
            file,
            doc: Mutex::new(doc),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&AclDocument) -> R) -> PersistenceResult<R> {
        let doc = self.doc.lock().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(f(&doc))
    }

    /// Apply `f` to a copy and publish it once saved
    fn mutate<R>(&self, f: impl FnOnce(&mut AclDocument) -> R) -> PersistenceResult<R> {
        let mut doc = self.doc.lock().map_err(|_| PersistenceError::Poisoned("acls"))?;
        let mut next = doc.clone();
        let result = f(&mut next);
        if next != *doc {
            self.file.save(&next)?;
            *doc = next;
        }
        Ok(result)
    }
}

impl ManagedAclStore for FileAclStore {
    fn get_acls(&self, organization: &str) -> PersistenceResult<Vec<ManagedAcl>> {
        self.read(|doc| doc.list(organization))
    }

    fn get_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<Option<ManagedAcl>> {
        self.read(|doc| doc.get(organization, id))
    }

    fn create_acl(
        &self,
        organization: &str,
        name: &str,
        acl: &AccessControlList,
    ) -> PersistenceResult<Option<ManagedAcl>> {
        self.mutate(|doc| doc.create(organization, name, acl))
    }

    fn update_acl(&self, acl: &ManagedAcl) -> PersistenceResult<bool> {
        self.mutate(|doc| doc.update(acl))
    }

    fn delete_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<bool> {
        self.mutate(|doc| doc.delete(organization, id))
    }
}

/// In-memory managed ACL store
#[derive(Debug, Default)]
pub struct MemAclStore {
    doc: RwLock<AclDocument>,
}

impl MemAclStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManagedAclStore for MemAclStore {
    fn get_acls(&self, organization: &str) -> PersistenceResult<Vec<ManagedAcl>> {
        let doc = self.doc.read().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(doc.list(organization))
    }

    fn get_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<Option<ManagedAcl>> {
        let doc = self.doc.read().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(doc.get(organization, id))
    }

    fn create_acl(
        &self,
        organization: &str,
        name: &str,
        acl: &AccessControlList,
    ) -> PersistenceResult<Option<ManagedAcl>> {
        let mut doc = self.doc.write().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(doc.create(organization, name, acl))
    }

    fn update_acl(&self, acl: &ManagedAcl) -> PersistenceResult<bool> {
        let mut doc = self.doc.write().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(doc.update(acl))
    }

    fn delete_acl(&self, organization: &str, id: ManagedAclId) -> PersistenceResult<bool> {
        let mut doc = self.doc.write().map_err(|_| PersistenceError::Poisoned("acls"))?;
        Ok(doc.delete(organization, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::model::AccessControlEntry;
    use tempfile::TempDir;

    fn public() -> AccessControlList {
        AccessControlList::default().with_entry(AccessControlEntry::new("ROLE_ANONYMOUS", "read", true))
    }

    #[test]
    fn test_create_rejects_duplicate_name_per_organization() {
        let store = MemAclStore::new();

        let first = store.create_acl("o1", "public", &public()).unwrap().unwrap();
        assert_eq!(first.id, 1);
        assert!(store.create_acl("o1", "public", &public()).unwrap().is_none());
        assert!(store.create_acl("o2", "public", &public()).unwrap().is_some());
        assert_eq!(store.get_acls("o1").unwrap().len(), 1);
    }

    #[test]
    fn test_organization_isolation() {
        let store = MemAclStore::new();
        let acl = store.create_acl("o1", "public", &public()).unwrap().unwrap();

        assert!(store.get_acl("o2", acl.id).unwrap().is_none());
        assert!(!store.delete_acl("o2", acl.id).unwrap());
        assert!(store.delete_acl("o1", acl.id).unwrap());
        assert!(!store.delete_acl("o1", acl.id).unwrap());
    }

    #[test]
    fn test_update_rename_conflict() {
        let store = MemAclStore::new();
        store.create_acl("o1", "a", &public()).unwrap();
        let mut b = store.create_acl("o1", "b", &public()).unwrap().unwrap();

        b.name = "a".into();
        assert!(!store.update_acl(&b).unwrap());
        b.name = "c".into();
        assert!(store.update_acl(&b).unwrap());
        assert_eq!(store.get_acl("o1", b.id).unwrap().unwrap().name, "c");
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("acls.json");

        let created = {
            let store = FileAclStore::open(&path).unwrap();
            store.create_acl("o1", "public", &public()).unwrap().unwrap()
        };

        let store = FileAclStore::open(&path).unwrap();
        assert_eq!(store.get_acl("o1", created.id).unwrap(), Some(created));
        // Ids keep increasing after reopen
        let next = store.create_acl("o1", "private", &AccessControlList::default()).unwrap().unwrap();
        assert_eq!(next.id, 2);
    }
}
