//! Group domain model.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::Principal;

/// Whether a group is visible to normal lookups.
///
/// Not stored as a field: derived from the lock marker on the entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Active,
    Inactive,
}

/// Bare projection of a group: only the id and the description.
///
/// Used for nested members and permission-group references. Equality,
/// ordering and hashing consider the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub description: Option<String>,
}

impl GroupRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
        }
    }
}

impl PartialEq for GroupRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GroupRef {}

impl Hash for GroupRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for GroupRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// A named group with an owner, members and an access policy.
///
/// Membership in `group_read` grants read access to this group and
/// membership in `group_write` grants write access. `public_read` opens
/// read access to everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub owner: Option<Principal>,
    pub description: Option<String>,
    pub public_read: bool,
    pub group_read: Option<GroupRef>,
    pub group_write: Option<GroupRef>,
    pub user_members: BTreeSet<Principal>,
    pub group_members: BTreeSet<GroupRef>,
    /// Not supported by the directory; must stay empty.
    pub properties: BTreeMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub state: LifecycleState,
}

impl Group {
    pub fn new(id: impl Into<String>, owner: Principal) -> Self {
        Self {
            id: id.into(),
            owner: Some(owner),
            ..Default::default()
        }
    }

    /// The bare projection of this group.
    pub fn to_ref(&self) -> GroupRef {
        GroupRef {
            id: self.id.clone(),
            description: self.description.clone(),
        }
    }

    /// True if `reference` points at this group.
    pub fn is_self(&self, reference: &GroupRef) -> bool {
        reference.id == self.id
    }
}

impl From<GroupRef> for Group {
    fn from(reference: GroupRef) -> Self {
        Self {
            id: reference.id,
            description: reference.description,
            ..Default::default()
        }
    }
}

/// Result of `add_group`: a brand-new entry or a reactivated tombstone.
#[derive(Debug, Clone)]
pub enum AddGroupOutcome {
    Created(Group),
    Reactivated(Group),
}

impl AddGroupOutcome {
    pub fn group(&self) -> &Group {
        match self {
            Self::Created(group) | Self::Reactivated(group) => group,
        }
    }

    pub fn into_group(self) -> Group {
        match self {
            Self::Created(group) | Self::Reactivated(group) => group,
        }
    }

    pub fn is_reactivated(&self) -> bool {
        matches!(self, Self::Reactivated(_))
    }
}
