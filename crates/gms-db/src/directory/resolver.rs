//! SurrealDB implementation of [`PrincipalResolver`].

use gms_core::directory::{Dn, PrincipalResolver};
use gms_core::error::{GmsError, GmsResult};
use gms_core::models::group::GroupRef;
use gms_core::models::user::{Principal, User};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;

use super::session::SurrealDirectorySession;
use crate::error::DbError;
use crate::repository::PersonRowWithId;

#[derive(Debug, SurrealValue)]
struct DnRow {
    dn: String,
}

#[derive(Debug, SurrealValue)]
struct GroupRefRow {
    cn: String,
    description: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

impl<C: Connection> PrincipalResolver for SurrealDirectorySession<C> {
    async fn resolve_directory_key(&self, principal: &Principal) -> GmsResult<Dn> {
        let mut result = self
            .db
            .query("SELECT dn FROM person WHERE username = $username")
            .bind(("username", principal.username.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DnRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| Dn::new(row.dn))
            .ok_or_else(|| GmsError::user_not_found(principal.username.clone()))
    }

    async fn resolve_member(&self, dn: &Dn, with_details: bool) -> GmsResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM person WHERE dn = $dn")
            .bind(("dn", dn.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PersonRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| GmsError::user_not_found(dn.to_string()))?;

        let mut user = row.try_into_user()?;
        if !with_details {
            user.display_name = None;
        }
        Ok(user)
    }

    async fn is_member(&self, principal: &Principal, group_id: &str) -> GmsResult<bool> {
        let member = self.resolve_directory_key(principal).await?;

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group_entry \
                 WHERE cn = $cn AND unique_member CONTAINS $member \
                 AND account_lock = NONE GROUP ALL",
            )
            .bind(("cn", group_id.to_string()))
            .bind(("member", member.into_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn groups_containing(&self, principal: &Principal) -> GmsResult<Vec<GroupRef>> {
        let member = self.resolve_directory_key(principal).await?;

        let mut result = self
            .db
            .query(
                "SELECT cn, description FROM group_entry \
                 WHERE unique_member CONTAINS $member \
                 AND account_lock = NONE \
                 ORDER BY cn ASC",
            )
            .bind(("member", member.into_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRefRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| GroupRef {
                id: row.cn,
                description: row.description,
            })
            .collect())
    }
}
