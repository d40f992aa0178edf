//! Membership delta between two snapshots of a group.

use std::collections::BTreeSet;

use gms_core::models::group::{Group, GroupRef};
use gms_core::models::user::Principal;

/// A borrowed view of a group's direct members.
#[derive(Debug, Clone, Copy)]
pub struct Membership<'a> {
    pub users: &'a BTreeSet<Principal>,
    pub groups: &'a BTreeSet<GroupRef>,
}

impl<'a> Membership<'a> {
    pub fn of(group: &'a Group) -> Self {
        Self {
            users: &group.user_members,
            groups: &group.group_members,
        }
    }
}

/// Members to add and remove, compared by principal and group id.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MembershipDelta<'a> {
    pub users_to_add: Vec<&'a Principal>,
    pub users_to_remove: Vec<&'a Principal>,
    pub groups_to_add: Vec<&'a GroupRef>,
    pub groups_to_remove: Vec<&'a GroupRef>,
}

impl MembershipDelta<'_> {
    pub fn is_empty(&self) -> bool {
        self.users_to_add.is_empty()
            && self.users_to_remove.is_empty()
            && self.groups_to_add.is_empty()
            && self.groups_to_remove.is_empty()
    }
}

/// `new \ old` to add and `old \ new` to remove. Neither input is
/// touched.
pub fn diff<'a>(old: Membership<'a>, new: Membership<'a>) -> MembershipDelta<'a> {
    MembershipDelta {
        users_to_add: new.users.difference(old.users).collect(),
        users_to_remove: old.users.difference(new.users).collect(),
        groups_to_add: new.groups.difference(old.groups).collect(),
        groups_to_remove: old.groups.difference(new.groups).collect(),
    }
}
