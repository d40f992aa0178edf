//! Group service — per-call session orchestration.

use gms_core::config::DirectoryConfig;
use gms_core::directory::DirectoryConnector;
use gms_core::error::GmsResult;
use gms_core::models::group::{AddGroupOutcome, Group};
use gms_core::models::role::Role;
use gms_core::models::user::Principal;

use crate::group_directory::GroupDirectory;

/// Group service.
///
/// Generic over the directory connector so that the engine has no
/// dependency on the database crate. Every call opens its own session
/// and releases it before returning, so one service can be shared
/// across tasks.
pub struct GroupService<D: DirectoryConnector> {
    connector: D,
    config: DirectoryConfig,
}

impl<D: DirectoryConnector> GroupService<D> {
    pub fn new(connector: D, config: DirectoryConfig) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Create `group` as `caller`. A tombstone of the same id owned by
    /// the caller is reactivated instead.
    pub async fn add_group(&self, caller: &Principal, group: Group) -> GmsResult<AddGroupOutcome> {
        let session = self.connector.open().await?;
        let directory = GroupDirectory::for_caller(&session, &self.config, caller).await?;
        directory.add_group(group).await
    }

    pub async fn get_group(&self, caller: &Principal, id: &str) -> GmsResult<Group> {
        let session = self.connector.open().await?;
        let directory = GroupDirectory::for_caller(&session, &self.config, caller).await?;
        directory.get_group(id).await
    }

    pub async fn modify_group(&self, caller: &Principal, group: Group) -> GmsResult<Group> {
        let session = self.connector.open().await?;
        let directory = GroupDirectory::for_caller(&session, &self.config, caller).await?;
        directory.modify_group(group).await
    }

    /// Tombstone the active group `id`.
    pub async fn delete_group(&self, caller: &Principal, id: &str) -> GmsResult<()> {
        let session = self.connector.open().await?;
        let directory = GroupDirectory::for_caller(&session, &self.config, caller).await?;
        directory.delete_group(id).await
    }

    /// Active groups in which `principal` plays `role`.
    pub async fn search_groups(
        &self,
        caller: &Principal,
        principal: &Principal,
        role: Role,
        id: Option<&str>,
    ) -> GmsResult<Vec<Group>> {
        let session = self.connector.open().await?;
        let directory = GroupDirectory::for_caller(&session, &self.config, caller).await?;
        directory.search_groups(principal, role, id).await
    }
}
