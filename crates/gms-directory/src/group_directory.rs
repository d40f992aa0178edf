//! Group lifecycle and role search over a directory session.
//!
//! A [`GroupDirectory`] is bound to one session and one caller for the
//! duration of a single call. Every write it issues carries the caller's
//! directory key so the backend evaluates its own access control against
//! that identity.

use std::collections::BTreeMap;

use gms_core::config::DirectoryConfig;
use gms_core::directory::{
    Attribute, DirectorySession, Dn, Entry, Filter, GROUP_OBJECT_CLASS, LOCKED, Modification,
    PrincipalResolver, attr,
};
use gms_core::error::{GmsError, GmsResult};
use gms_core::models::group::{AddGroupOutcome, Group, GroupRef, LifecycleState};
use gms_core::models::role::Role;
use gms_core::models::user::Principal;
use tracing::{debug, info, warn};

use crate::acl::AclCodec;
use crate::error::{GroupError, bug};
use crate::membership::{self, Membership};

/// Attributes of the projection returned by owner searches.
const OWNER_PROJECTION: &[&str] = &[attr::CN, attr::DESCRIPTION, attr::MODIFY_TIMESTAMP];

pub struct GroupDirectory<'a, S> {
    session: &'a S,
    config: &'a DirectoryConfig,
    caller: &'a Principal,
    caller_dn: Dn,
}

impl<'a, S> GroupDirectory<'a, S>
where
    S: DirectorySession + PrincipalResolver,
{
    /// Bind `session` to `caller`, resolving the caller's directory key.
    pub async fn for_caller(
        session: &'a S,
        config: &'a DirectoryConfig,
        caller: &'a Principal,
    ) -> GmsResult<Self> {
        let caller_dn = session.resolve_directory_key(caller).await?;
        Ok(Self {
            session,
            config,
            caller,
            caller_dn,
        })
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// Create `group`, or reactivate its tombstone when the caller owns it.
    pub async fn add_group(&self, group: Group) -> GmsResult<AddGroupOutcome> {
        let owner = group
            .owner
            .clone()
            .ok_or_else(|| GroupError::MissingOwner(group.id.clone()))?;
        check_properties(&group)?;
        check_self_references(&group)?;
        let dn = self.config.group_dn(&group.id)?;

        if self.lookup(&group.id, LifecycleState::Active).await?.is_some() {
            return Err(GmsError::AlreadyExists {
                entity: "group".into(),
                id: group.id,
            });
        }

        if let Some(tombstone) = self.lookup(&group.id, LifecycleState::Inactive).await? {
            return self.reactivate(&dn, tombstone, group).await;
        }

        let owner_dn = self.session.resolve_directory_key(&owner).await?;
        let mut attributes = vec![
            Attribute::single(attr::OBJECT_CLASS, GROUP_OBJECT_CLASS),
            Attribute::single(attr::CN, group.id.as_str()),
            Attribute::single(attr::OWNER, owner_dn.into_string()),
        ];
        if let Some(description) = &group.description {
            attributes.push(Attribute::single(attr::DESCRIPTION, description.as_str()));
        }
        let acl = self.encode_acl(&group).await?;
        if !acl.is_empty() {
            attributes.push(Attribute::new(attr::ACI, acl));
        }
        let mut members = Vec::with_capacity(group.user_members.len() + group.group_members.len());
        for user in &group.user_members {
            members.push(self.user_dn(user).await?.into_string());
        }
        for member in &group.group_members {
            members.push(self.existing_group_dn(member).await?.into_string());
        }
        if !members.is_empty() {
            attributes.push(Attribute::new(attr::UNIQUE_MEMBER, members));
        }

        self.session
            .add(&dn, attributes, Some(&self.caller_dn))
            .await?;
        info!(group = %group.id, caller = %self.caller, "Group created");

        match self.get_group(&group.id).await {
            Ok(created) => Ok(AddGroupOutcome::Created(created)),
            Err(e) if e.is_group_not_found() => {
                bug(format!("group {} missing right after create", group.id))
            }
            Err(e) => Err(e),
        }
    }

    async fn reactivate(
        &self,
        dn: &Dn,
        tombstone: Entry,
        group: Group,
    ) -> GmsResult<AddGroupOutcome> {
        let tombstone_owner = tombstone.first_dn(attr::OWNER);
        if tombstone_owner.as_ref() != Some(&self.caller_dn) {
            warn!(
                group = %group.id,
                caller = %self.caller,
                "Reactivation denied: caller does not own the tombstone"
            );
            return Err(GroupError::NotTombstoneOwner {
                id: group.id,
                caller: self.caller.to_string(),
            }
            .into());
        }

        let old = self.to_group(tombstone).await?;
        let mut changes = vec![Modification::delete_all(attr::ACCOUNT_LOCK)];
        changes.extend(self.changes(&old, &group).await?);

        self.session
            .modify(
                dn,
                changes,
                &in_state(LifecycleState::Inactive),
                Some(&self.caller_dn),
            )
            .await?;
        info!(group = %group.id, caller = %self.caller, "Group reactivated");

        match self.get_group(&group.id).await {
            Ok(reactivated) => Ok(AddGroupOutcome::Reactivated(reactivated)),
            Err(e) if e.is_group_not_found() => {
                bug(format!("group {} missing right after reactivation", group.id))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the active group `id` with owner, membership and policy.
    pub async fn get_group(&self, id: &str) -> GmsResult<Group> {
        let entry = self.require_active(id).await?;
        self.to_group(entry).await
    }

    /// Apply the fields of `group` to the stored active group of the same id.
    pub async fn modify_group(&self, group: Group) -> GmsResult<Group> {
        check_properties(&group)?;
        check_self_references(&group)?;
        let dn = self.config.group_dn(&group.id)?;

        let old = self.get_group(&group.id).await?;
        let changes = self.changes(&old, &group).await?;
        let count = changes.len();

        self.session
            .modify(
                &dn,
                changes,
                &in_state(LifecycleState::Active),
                Some(&self.caller_dn),
            )
            .await?;
        info!(group = %group.id, caller = %self.caller, changes = count, "Group modified");

        match self.get_group(&group.id).await {
            Ok(modified) => Ok(modified),
            Err(e) if e.is_group_not_found() => {
                bug(format!("group {} missing right after modify", group.id))
            }
            Err(e) => Err(e),
        }
    }

    /// Lock the active group `id` and strip it down to a tombstone.
    pub async fn delete_group(&self, id: &str) -> GmsResult<()> {
        let dn = self.config.group_dn(id)?;
        let old = self.require_active(id).await?;

        let mut changes = vec![Modification::add(attr::ACCOUNT_LOCK, vec![LOCKED.into()])];
        for stripped in [attr::DESCRIPTION, attr::ACI, attr::UNIQUE_MEMBER] {
            if !old.values(stripped).is_empty() {
                changes.push(Modification::delete_all(stripped));
            }
        }

        self.session
            .modify(
                &dn,
                changes,
                &in_state(LifecycleState::Active),
                Some(&self.caller_dn),
            )
            .await?;
        info!(group = %id, caller = %self.caller, "Group deleted");

        match self.get_group(id).await {
            Err(e) if e.is_group_not_found() => Ok(()),
            Err(e) => Err(e),
            Ok(_) => bug(format!("group {id} still active after delete")),
        }
    }

    // -------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------

    /// Active groups in which `principal` plays `role`, optionally
    /// narrowed to the group `id`.
    pub async fn search_groups(
        &self,
        principal: &Principal,
        role: Role,
        id: Option<&str>,
    ) -> GmsResult<Vec<Group>> {
        debug!(principal = %principal, role = %role, group = ?id, "Group search");
        match role {
            Role::Owner => self.search_owned(principal, id).await,
            Role::Member => self.search_member(principal, id).await,
            Role::ReadWrite => self.search_read_write(principal, id).await,
        }
    }

    async fn search_owned(&self, principal: &Principal, id: Option<&str>) -> GmsResult<Vec<Group>> {
        let owner_dn = self.session.resolve_directory_key(principal).await?;
        let mut filter = Filter::eq(attr::OWNER, owner_dn.into_string());
        if let Some(id) = id {
            self.require_active(id).await?;
            filter = Filter::and(vec![filter, Filter::eq(attr::CN, id)]);
        }

        let entries = self
            .session
            .search(
                &self.config.groups_base(),
                &filter.active(),
                OWNER_PROJECTION,
                Some(&self.caller_dn),
            )
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| Group {
                id: entry_id(&entry).to_string(),
                description: entry.first(attr::DESCRIPTION).map(str::to_string),
                last_modified: entry.first_datetime(attr::MODIFY_TIMESTAMP),
                owner: Some(principal.clone()),
                ..Default::default()
            })
            .collect())
    }

    async fn search_member(
        &self,
        principal: &Principal,
        id: Option<&str>,
    ) -> GmsResult<Vec<Group>> {
        match id {
            Some(id) => {
                if self.session.is_member(principal, id).await? {
                    Ok(vec![self.get_group(id).await?])
                } else {
                    Ok(Vec::new())
                }
            }
            None => Ok(self
                .session
                .groups_containing(principal)
                .await?
                .into_iter()
                .map(Group::from)
                .collect()),
        }
    }

    /// Groups whose read and write delegations both name a group that
    /// `principal` owns or belongs to. Unlike the owner search, a given
    /// `id` is only checked for syntax, not for existence.
    async fn search_read_write(
        &self,
        principal: &Principal,
        id: Option<&str>,
    ) -> GmsResult<Vec<Group>> {
        let candidates = match id {
            Some(id) => {
                self.config.group_dn(id)?;
                vec![Group::new(id, principal.clone())]
            }
            None => {
                let mut by_id = BTreeMap::new();
                for group in self.search_owned(principal, None).await? {
                    by_id.insert(group.id.clone(), group);
                }
                for group in self.search_member(principal, None).await? {
                    by_id.entry(group.id.clone()).or_insert(group);
                }
                by_id.into_values().collect::<Vec<_>>()
            }
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut filters = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let read = candidate.group_read.clone().unwrap_or_else(|| candidate.to_ref());
            let write = candidate.group_write.clone().unwrap_or_else(|| candidate.to_ref());
            let read_dn = self.config.group_dn(&read.id)?;
            let write_dn = self.config.group_dn(&write.id)?;
            filters.push(Filter::and(vec![
                Filter::eq(attr::ACI, AclCodec::read_statement(&read_dn)),
                Filter::eq(attr::ACI, AclCodec::write_statement(&write_dn)),
            ]));
        }
        debug!(candidates = filters.len(), "Read-write search");

        let entries = self
            .session
            .search(
                &self.config.groups_base(),
                &Filter::or(filters).active(),
                &[],
                Some(&self.caller_dn),
            )
            .await?;

        let mut groups = Vec::with_capacity(entries.len());
        for entry in entries {
            groups.push(self.to_group(entry).await?);
        }
        Ok(groups)
    }

    // -------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------

    async fn lookup(&self, id: &str, state: LifecycleState) -> GmsResult<Option<Entry>> {
        let filter = Filter::and(vec![Filter::eq(attr::CN, id), in_state(state)]);
        let entries = self
            .session
            .search(
                &self.config.groups_base(),
                &filter,
                &[],
                Some(&self.caller_dn),
            )
            .await?;
        debug!(group = %id, state = ?state, found = !entries.is_empty(), "Group lookup");
        Ok(entries.into_iter().next())
    }

    async fn require_active(&self, id: &str) -> GmsResult<Entry> {
        self.config.group_dn(id)?;
        self.lookup(id, LifecycleState::Active)
            .await?
            .ok_or_else(|| GmsError::group_not_found(id))
    }

    /// Map a stored entry to a fully populated group.
    async fn to_group(&self, entry: Entry) -> GmsResult<Group> {
        let id = entry_id(&entry).to_string();

        let owner = match entry.first_dn(attr::OWNER) {
            Some(dn) => Some(self.member_principal(&id, &dn).await?),
            None => None,
        };

        let users_base = self.config.users_base();
        let groups_base = self.config.groups_base();
        let mut group = Group {
            id,
            owner,
            description: entry.first(attr::DESCRIPTION).map(str::to_string),
            last_modified: entry.first_datetime(attr::MODIFY_TIMESTAMP),
            state: if entry.first(attr::ACCOUNT_LOCK) == Some(LOCKED) {
                LifecycleState::Inactive
            } else {
                LifecycleState::Active
            },
            ..Default::default()
        };

        for value in entry.values(attr::UNIQUE_MEMBER) {
            let dn = Dn::new(value.as_str());
            if dn.is_descendant_of(&users_base) {
                let principal = self.member_principal(&group.id, &dn).await?;
                group.user_members.insert(principal);
            } else if dn.is_descendant_of(&groups_base) {
                group.group_members.insert(self.nested_group(&dn).await?);
            } else {
                bug(format!("member {dn} of {} is outside both subtrees", group.id));
            }
        }

        let policy = AclCodec::decode(entry.values(attr::ACI));
        group.public_read = policy.public_read;
        group.group_read = policy.group_read;
        group.group_write = policy.group_write;
        Ok(group)
    }

    async fn member_principal(&self, group: &str, dn: &Dn) -> GmsResult<Principal> {
        match self.session.resolve_member(dn, false).await {
            Ok(user) => Ok(user.principal),
            Err(GmsError::NotFound { .. }) => {
                bug(format!("{dn} referenced by {group} does not resolve"))
            }
            Err(e) => Err(e),
        }
    }

    async fn nested_group(&self, dn: &Dn) -> GmsResult<GroupRef> {
        let entry = self
            .session
            .fetch_by_key(dn, &[attr::CN, attr::DESCRIPTION])
            .await?;
        match entry {
            Some(entry) => Ok(GroupRef {
                id: entry_id(&entry).to_string(),
                description: entry.first(attr::DESCRIPTION).map(str::to_string),
            }),
            None => match dn.rdn_value() {
                Some(id) => Ok(GroupRef::new(id)),
                None => bug(format!("nested group key {dn} has no rdn")),
            },
        }
    }

    /// Modifications turning `old` into `new`. ACL statements are always
    /// replaced in full; membership changes are value-level deletes and
    /// adds so concurrent member edits are not overwritten.
    async fn changes(&self, old: &Group, new: &Group) -> GmsResult<Vec<Modification>> {
        let mut changes = Vec::new();

        match (&old.description, &new.description) {
            (None, Some(description)) => {
                changes.push(Modification::add(attr::DESCRIPTION, vec![description.clone()]));
            }
            (Some(_), None) => changes.push(Modification::delete_all(attr::DESCRIPTION)),
            (Some(previous), Some(description)) if previous != description => {
                changes.push(Modification::replace(
                    attr::DESCRIPTION,
                    vec![description.clone()],
                ));
            }
            _ => {}
        }

        if let Some(owner) = &new.owner {
            if old.owner.as_ref() != Some(owner) {
                let owner_dn = self.session.resolve_directory_key(owner).await?;
                changes.push(Modification::replace(
                    attr::OWNER,
                    vec![owner_dn.into_string()],
                ));
            }
        }

        changes.push(Modification::replace(attr::ACI, self.encode_acl(new).await?));

        let delta = membership::diff(Membership::of(old), Membership::of(new));
        let mut removed = Vec::new();
        for user in delta.users_to_remove {
            removed.push(self.user_dn(user).await?.into_string());
        }
        for member in delta.groups_to_remove {
            removed.push(self.config.group_dn(&member.id)?.into_string());
        }
        let mut added = Vec::new();
        for user in delta.users_to_add {
            added.push(self.user_dn(user).await?.into_string());
        }
        for member in delta.groups_to_add {
            added.push(self.existing_group_dn(member).await?.into_string());
        }
        if !removed.is_empty() {
            changes.push(Modification::delete(attr::UNIQUE_MEMBER, removed));
        }
        if !added.is_empty() {
            changes.push(Modification::add(attr::UNIQUE_MEMBER, added));
        }

        Ok(changes)
    }

    async fn encode_acl(&self, group: &Group) -> GmsResult<Vec<String>> {
        let read = match &group.group_read {
            Some(reference) => Some(self.existing_group_dn(reference).await?),
            None => None,
        };
        let write = match &group.group_write {
            Some(reference) => Some(self.existing_group_dn(reference).await?),
            None => None,
        };
        Ok(AclCodec::encode(
            group.public_read,
            read.as_ref(),
            write.as_ref(),
        ))
    }

    async fn user_dn(&self, user: &Principal) -> GmsResult<Dn> {
        self.session.resolve_directory_key(user).await
    }

    /// Directory key of a referenced group, which must exist.
    async fn existing_group_dn(&self, reference: &GroupRef) -> GmsResult<Dn> {
        let dn = self.config.group_dn(&reference.id)?;
        match self.session.fetch_by_key(&dn, &[attr::CN]).await? {
            Some(_) => Ok(dn),
            None => Err(GmsError::group_not_found(reference.id.clone())),
        }
    }
}

/// Group entries in lifecycle `state`.
fn in_state(state: LifecycleState) -> Filter {
    let group = Filter::eq(attr::OBJECT_CLASS, GROUP_OBJECT_CLASS);
    match state {
        LifecycleState::Active => group.active(),
        LifecycleState::Inactive => group.inactive(),
    }
}

fn entry_id(entry: &Entry) -> &str {
    match entry.first(attr::CN) {
        Some(id) => id,
        None => bug(format!("entry {} has no cn", entry.dn)),
    }
}

fn check_properties(group: &Group) -> Result<(), GroupError> {
    if group.properties.is_empty() {
        Ok(())
    } else {
        Err(GroupError::UnsupportedProperties(group.id.clone()))
    }
}

/// Direct self references only; longer cycles are not detected.
fn check_self_references(group: &Group) -> Result<(), GroupError> {
    let self_reference = |field: &'static str| GroupError::SelfReference {
        id: group.id.clone(),
        field,
    };
    if group.group_read.as_ref().is_some_and(|r| group.is_self(r)) {
        return Err(self_reference("group_read"));
    }
    if group.group_write.as_ref().is_some_and(|r| group.is_self(r)) {
        return Err(self_reference("group_write"));
    }
    if group.group_members.iter().any(|r| group.is_self(r)) {
        return Err(self_reference("group_members"));
    }
    Ok(())
}
