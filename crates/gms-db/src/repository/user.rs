//! SurrealDB implementation of [`UserRepository`].
//!
//! Users live in the `person` table. Each user carries the directory key
//! (`uid=<username>,<users_dn>`) that group owner and member attributes
//! refer to.

use chrono::{DateTime, Utc};
use gms_core::config::DirectoryConfig;
use gms_core::directory::Dn;
use gms_core::error::{GmsError, GmsResult};
use gms_core::models::user::{CreateUser, Principal, User};
use gms_core::repository::UserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct PersonRow {
    username: String,
    dn: String,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct PersonRowWithId {
    record_id: String,
    username: String,
    dn: String,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl PersonRow {
    fn into_user(self, id: Uuid) -> User {
        User {
            id,
            principal: Principal::new(self.username),
            dn: Dn::new(self.dn),
            display_name: self.display_name,
            created_at: self.created_at,
        }
    }
}

impl PersonRowWithId {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        Ok(PersonRow {
            username: self.username,
            dn: self.dn,
            display_name: self.display_name,
            created_at: self.created_at,
        }
        .into_user(id))
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    config: DirectoryConfig,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>, config: DirectoryConfig) -> Self {
        Self { db, config }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> GmsResult<User> {
        let dn = self.config.user_dn(&input.username)?;

        let mut check = self
            .db
            .query("SELECT count() AS total FROM person WHERE username = $username GROUP ALL")
            .bind(("username", input.username.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if existing.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Err(GmsError::AlreadyExists {
                entity: "user".into(),
                id: input.username,
            });
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('person', $id) SET \
                 username = $username, dn = $dn, \
                 display_name = $display_name",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("dn", dn.into_string()))
            .bind(("display_name", input.display_name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, &id_str))?;

        let rows: Vec<PersonRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_username(&self, username: &str) -> GmsResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM person WHERE username = $username")
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PersonRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_user()?)
    }
}
