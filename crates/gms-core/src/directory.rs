//! Directory abstractions consumed by the group engine.
//!
//! A [`DirectorySession`] is an attribute-oriented store of entries keyed
//! by [`Dn`]. Every mutating call carries the delegated caller identity so
//! the backend can evaluate its own access control against it. A
//! [`PrincipalResolver`] maps user principals to directory keys and
//! answers direct membership questions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GmsResult;
use crate::models::group::GroupRef;
use crate::models::user::{Principal, User};

/// Attribute names of a group entry.
pub mod attr {
    pub const OBJECT_CLASS: &str = "objectclass";
    pub const CN: &str = "cn";
    pub const DESCRIPTION: &str = "description";
    pub const OWNER: &str = "owner";
    pub const ACI: &str = "aci";
    pub const UNIQUE_MEMBER: &str = "uniquemember";
    pub const ACCOUNT_LOCK: &str = "nsaccountlock";
    pub const MODIFY_TIMESTAMP: &str = "modifytimestamp";
    pub const ENTRY_DN: &str = "entrydn";
    /// Delegated identity of the last writer, maintained by the backend.
    pub const MODIFIERS_NAME: &str = "modifiersname";
    /// Delegated identity that created the entry.
    pub const CREATORS_NAME: &str = "creatorsname";
}

/// Kind marker stored in `objectclass` of every group entry.
pub const GROUP_OBJECT_CLASS: &str = "groupofuniquenames";

/// Value of the lock marker on an inactive (tombstoned) entry.
pub const LOCKED: &str = "true";

/// A directory key (distinguished name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dn(String);

impl Dn {
    pub fn new(dn: impl Into<String>) -> Self {
        Self(dn.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True if `self` sits strictly below `base` in the tree.
    pub fn is_descendant_of(&self, base: &Dn) -> bool {
        let dn = self.0.to_ascii_lowercase();
        let suffix = format!(",{}", base.0.to_ascii_lowercase());
        dn.len() > suffix.len() && dn.ends_with(&suffix)
    }

    /// True if `self` is `base` or sits below it.
    pub fn is_within(&self, base: &Dn) -> bool {
        self.0.eq_ignore_ascii_case(&base.0) || self.is_descendant_of(base)
    }

    /// Value of the leftmost RDN (`cn=foo,ou=x` → `foo`).
    pub fn rdn_value(&self) -> Option<&str> {
        let rdn = self.0.split(',').next()?;
        let (_, value) = rdn.split_once('=')?;
        Some(value.trim())
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directory entry returned by a search or fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dn: Dn,
    attributes: BTreeMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: BTreeMap::new(),
        }
    }

    /// Set `name` to `values`; empty value lists are not stored.
    pub fn with(mut self, name: &str, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.attributes.insert(name.to_ascii_lowercase(), values);
        }
        self
    }

    /// Keep only the named attributes.
    pub fn project(mut self, names: &[&str]) -> Self {
        self.attributes
            .retain(|name, _| names.iter().any(|n| n.eq_ignore_ascii_case(name)));
        self
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_dn(&self, name: &str) -> Option<Dn> {
        self.first(name).map(Dn::new)
    }

    /// First value of `name` parsed as an RFC 3339 timestamp.
    pub fn first_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        self.first(name)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// A named attribute with its values, used when adding entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(name: &str, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn single(name: &str, value: impl Into<String>) -> Self {
        Self::new(name, vec![value.into()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Add,
    Delete,
    Replace,
}

/// One attribute change inside a modify request.
///
/// A `Delete` without values removes the whole attribute; with values it
/// removes only those values. A `Replace` without values clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationKind,
    pub attribute: String,
    pub values: Vec<String>,
}

impl Modification {
    pub fn add(attribute: &str, values: Vec<String>) -> Self {
        Self {
            kind: ModificationKind::Add,
            attribute: attribute.into(),
            values,
        }
    }

    pub fn delete(attribute: &str, values: Vec<String>) -> Self {
        Self {
            kind: ModificationKind::Delete,
            attribute: attribute.into(),
            values,
        }
    }

    pub fn delete_all(attribute: &str) -> Self {
        Self::delete(attribute, Vec::new())
    }

    pub fn replace(attribute: &str, values: Vec<String>) -> Self {
        Self {
            kind: ModificationKind::Replace,
            attribute: attribute.into(),
            values,
        }
    }
}

/// Search filter over entry attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Some value of the attribute equals the given value.
    Equals(String, String),
    /// The attribute has at least one value.
    Present(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(attribute: &str, value: impl Into<String>) -> Self {
        Self::Equals(attribute.into(), value.into())
    }

    pub fn present(attribute: &str) -> Self {
        Self::Present(attribute.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Restrict `self` to entries without the lock marker.
    pub fn active(self) -> Self {
        Self::and(vec![self, Self::not(Self::eq(attr::ACCOUNT_LOCK, LOCKED))])
    }

    /// Restrict `self` to entries carrying the lock marker.
    pub fn inactive(self) -> Self {
        Self::and(vec![self, Self::eq(attr::ACCOUNT_LOCK, LOCKED)])
    }
}

/// A session against the directory backend.
///
/// Sessions release their backend resources when dropped, so a session
/// scoped to one call is released on every exit path.
pub trait DirectorySession: Send + Sync {
    /// Search the subtree under `base` and return the requested
    /// attributes of every matching entry.
    fn search(
        &self,
        base: &Dn,
        filter: &Filter,
        attributes: &[&str],
        as_principal: Option<&Dn>,
    ) -> impl Future<Output = GmsResult<Vec<Entry>>> + Send;

    /// Create a new entry. Fails with `AlreadyExists` if `dn` is taken.
    fn add(
        &self,
        dn: &Dn,
        attributes: Vec<Attribute>,
        as_principal: Option<&Dn>,
    ) -> impl Future<Output = GmsResult<()>> + Send;

    /// Apply all `changes` to `dn` as one update, provided the stored
    /// entry still matches `precondition`. Fails with `NotFound` when no
    /// matching entry exists at the time of the write; nothing is
    /// changed in that case.
    fn modify(
        &self,
        dn: &Dn,
        changes: Vec<Modification>,
        precondition: &Filter,
        as_principal: Option<&Dn>,
    ) -> impl Future<Output = GmsResult<()>> + Send;

    /// Fetch a single entry by key, regardless of its lock marker.
    fn fetch_by_key(
        &self,
        dn: &Dn,
        attributes: &[&str],
    ) -> impl Future<Output = GmsResult<Option<Entry>>> + Send;
}

/// Maps user principals to directory identities and answers direct
/// membership queries.
pub trait PrincipalResolver: Send + Sync {
    fn resolve_directory_key(
        &self,
        principal: &Principal,
    ) -> impl Future<Output = GmsResult<Dn>> + Send;

    /// Resolve a user DN back to the stored user. Without details only
    /// the principal and DN are populated.
    fn resolve_member(
        &self,
        dn: &Dn,
        with_details: bool,
    ) -> impl Future<Output = GmsResult<User>> + Send;

    /// Direct membership of `principal` in the active group `group_id`.
    fn is_member(
        &self,
        principal: &Principal,
        group_id: &str,
    ) -> impl Future<Output = GmsResult<bool>> + Send;

    /// Active groups listing `principal` as a direct member.
    fn groups_containing(
        &self,
        principal: &Principal,
    ) -> impl Future<Output = GmsResult<Vec<GroupRef>>> + Send;
}

/// Opens per-call sessions against the backend.
pub trait DirectoryConnector: Send + Sync {
    type Session: DirectorySession + PrincipalResolver;

    fn open(&self) -> impl Future<Output = GmsResult<Self::Session>> + Send;
}
