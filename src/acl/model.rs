//! # ACL Model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a managed ACL
pub type ManagedAclId = u64;

/// One `(role, action, allow)` rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub role: String,
    pub action: String,
    pub allow: bool,
}

impl AccessControlEntry {
    pub fn new(role: impl Into<String>, action: impl Into<String>, allow: bool) -> Self {
        Self {
            role: role.into(),
            action: action.into(),
            allow,
        }
    }
}

/// Ordered list of access control entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    pub entries: Vec<AccessControlEntry>,
}

impl AccessControlList {
    pub fn new(entries: Vec<AccessControlEntry>) -> Self {
        Self { entries }
    }

    pub fn with_entry(mut self, entry: AccessControlEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// First matching entry decides; no match denies
    pub fn is_allowed(&self, role: &str, action: &str) -> bool {
        self.entries
            .iter()
            .find(|e| e.role == role && e.action == action)
            .map(|e| e.allow)
            .unwrap_or(false)
    }
}

/// Level an ACL is attached at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclScope {
    Episode,
    Series,
}

impl AclScope {
    /// Attachment flavor carrying an ACL of this scope
    pub fn flavor(&self) -> &'static str {
        match self {
            AclScope::Episode => "security/xacml+episode",
            AclScope::Series => "security/xacml+series",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AclScope::Episode => "episode",
            AclScope::Series => "series",
        }
    }
}

impl fmt::Display for AclScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, reusable ACL owned by an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedAcl {
    pub id: ManagedAclId,
    pub organization: String,
    pub name: String,
    pub acl: AccessControlList,
}
