//! SurrealDB implementation of [`DirectorySession`] and
//! [`DirectoryConnector`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gms_core::config::DirectoryConfig;
use gms_core::directory::{
    Attribute, DirectoryConnector, DirectorySession, Dn, Entry, Filter, Modification, attr,
};
use gms_core::error::GmsResult;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::query::{BindValue, Column, compile_filter, compile_update};
use crate::error::DbError;
use crate::schema::run_migrations;

const SELECT_ENTRY: &str = "SELECT dn, object_class, cn, description, owner, aci, \
     unique_member, account_lock, creators_name, modifiers_name, modify_timestamp \
     FROM group_entry";

/// DB-side row struct for a group entry.
#[derive(Debug, SurrealValue)]
struct GroupEntryRow {
    dn: String,
    object_class: Vec<String>,
    cn: String,
    description: Option<String>,
    owner: String,
    aci: Vec<String>,
    unique_member: Vec<String>,
    account_lock: Option<String>,
    creators_name: Option<String>,
    modifiers_name: Option<String>,
    modify_timestamp: DateTime<Utc>,
}

impl GroupEntryRow {
    fn into_entry(self) -> Entry {
        Entry::new(Dn::new(self.dn.clone()))
            .with(attr::ENTRY_DN, vec![self.dn])
            .with(attr::OBJECT_CLASS, self.object_class)
            .with(attr::CN, vec![self.cn])
            .with(attr::DESCRIPTION, self.description.into_iter().collect())
            .with(attr::OWNER, vec![self.owner])
            .with(attr::ACI, self.aci)
            .with(attr::UNIQUE_MEMBER, self.unique_member)
            .with(attr::ACCOUNT_LOCK, self.account_lock.into_iter().collect())
            .with(attr::CREATORS_NAME, self.creators_name.into_iter().collect())
            .with(attr::MODIFIERS_NAME, self.modifiers_name.into_iter().collect())
            .with(
                attr::MODIFY_TIMESTAMP,
                vec![self.modify_timestamp.to_rfc3339()],
            )
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Connector handing out one [`SurrealDirectorySession`] per call.
#[derive(Clone)]
pub struct SurrealDirectory<C: Connection> {
    db: Surreal<C>,
    config: DirectoryConfig,
}

impl<C: Connection> SurrealDirectory<C> {
    pub fn new(db: Surreal<C>, config: DirectoryConfig) -> Self {
        Self { db, config }
    }

    /// Apply pending schema migrations, then hand out sessions over `db`.
    pub async fn migrated(db: Surreal<C>, config: DirectoryConfig) -> Result<Self, DbError> {
        run_migrations(&db).await?;
        Ok(Self::new(db, config))
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }
}

impl<C: Connection> DirectoryConnector for SurrealDirectory<C> {
    type Session = SurrealDirectorySession<C>;

    async fn open(&self) -> GmsResult<Self::Session> {
        Ok(SurrealDirectorySession::new(
            self.db.clone(),
            self.config.clone(),
        ))
    }
}

/// A directory session over the `group_entry` and `person` tables.
///
/// Only the group subtree is searchable and writable; users are read
/// through the [`PrincipalResolver`](gms_core::directory::PrincipalResolver)
/// side of the session.
pub struct SurrealDirectorySession<C: Connection> {
    pub(super) db: Surreal<C>,
    pub(super) config: DirectoryConfig,
    id: Uuid,
}

impl<C: Connection> SurrealDirectorySession<C> {
    pub fn new(db: Surreal<C>, config: DirectoryConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "Directory session opened");
        Self { db, config, id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn entry_exists(&self, dn: &Dn) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM group_entry WHERE dn = $dn GROUP ALL")
            .bind(("dn", dn.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    fn check_group_subtree(&self, dn: &Dn) -> Result<(), DbError> {
        if dn.is_descendant_of(&self.config.groups_base()) {
            Ok(())
        } else {
            Err(DbError::Unsupported(format!(
                "{dn} is outside the group subtree"
            )))
        }
    }
}

impl<C: Connection> Drop for SurrealDirectorySession<C> {
    fn drop(&mut self) {
        debug!(session = %self.id, "Directory session closed");
    }
}

impl<C: Connection> DirectorySession for SurrealDirectorySession<C> {
    async fn search(
        &self,
        base: &Dn,
        filter: &Filter,
        attributes: &[&str],
        as_principal: Option<&Dn>,
    ) -> GmsResult<Vec<Entry>> {
        let groups_base = self.config.groups_base();
        if !base.is_within(&groups_base) && !groups_base.is_within(base) {
            return Ok(Vec::new());
        }

        let compiled = compile_filter(filter)?;
        let query = format!("{SELECT_ENTRY} WHERE {} ORDER BY cn ASC", compiled.sql);
        debug!(
            session = %self.id,
            base = %base,
            as_principal = ?as_principal.map(Dn::as_str),
            params = compiled.params.len(),
            "Directory search"
        );

        let mut builder = self.db.query(&query);
        for (name, value) in compiled.params {
            builder = match value {
                BindValue::One(v) => builder.bind((name, v)),
                BindValue::Many(v) => builder.bind((name, v)),
            };
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<GroupEntryRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(GroupEntryRow::into_entry)
            .filter(|entry| entry.dn.is_within(base))
            .map(|entry| project(entry, attributes))
            .collect())
    }

    async fn add(
        &self,
        dn: &Dn,
        attributes: Vec<Attribute>,
        as_principal: Option<&Dn>,
    ) -> GmsResult<()> {
        self.check_group_subtree(dn)?;

        let mut columns: BTreeMap<Column, Vec<String>> = BTreeMap::new();
        for attribute in attributes {
            let column = Column::for_attribute(&attribute.name)?;
            if !column.is_user_writable() {
                return Err(DbError::Unsupported(format!(
                    "attribute {} is maintained by the directory",
                    attribute.name
                ))
                .into());
            }
            columns.entry(column).or_default().extend(attribute.values);
        }

        match columns.get(&Column::Cn).map(Vec::as_slice) {
            Some([cn]) if Some(cn.as_str()) == dn.rdn_value() => {}
            _ => {
                return Err(DbError::Unsupported(format!("cn does not match {dn}")).into());
            }
        }
        if columns.get(&Column::Owner).is_none_or(|v| v.len() != 1) {
            return Err(DbError::Unsupported(format!("{dn} requires exactly one owner")).into());
        }

        if self.entry_exists(dn).await? {
            return Err(DbError::EntryExists(dn.to_string()).into());
        }

        let mut sets = vec![
            "dn = $dn".to_string(),
            "creators_name = $as_principal".to_string(),
            "modifiers_name = $as_principal".to_string(),
        ];
        let mut params = Vec::with_capacity(columns.len());
        for (column, values) in columns {
            let param = format!("p{}", params.len());
            sets.push(format!("{} = ${param}", column.name()));
            if column.is_multi_valued() {
                params.push((param, BindValue::Many(values)));
            } else {
                match <[String; 1]>::try_from(values) {
                    Ok([value]) => params.push((param, BindValue::One(value))),
                    Err(_) => {
                        return Err(DbError::Unsupported(format!(
                            "{} is single-valued",
                            column.name()
                        ))
                        .into());
                    }
                }
            }
        }

        let query = format!("CREATE group_entry SET {}", sets.join(", "));
        let mut builder = self
            .db
            .query(&query)
            .bind(("dn", dn.to_string()))
            .bind(("as_principal", as_principal.map(Dn::to_string)));
        for (name, value) in params {
            builder = match value {
                BindValue::One(v) => builder.bind((name, v)),
                BindValue::Many(v) => builder.bind((name, v)),
            };
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, dn.as_str()))?;

        debug!(session = %self.id, dn = %dn, "Directory entry added");
        Ok(())
    }

    async fn modify(
        &self,
        dn: &Dn,
        changes: Vec<Modification>,
        precondition: &Filter,
        as_principal: Option<&Dn>,
    ) -> GmsResult<()> {
        self.check_group_subtree(dn)?;
        let update = compile_update(&changes, precondition)?;

        // A single statement, so the precondition and every change are
        // evaluated against the same stored version of the entry.
        let mut sets = update.assignments;
        sets.push("modify_timestamp = time::now()".to_string());
        sets.push("modifiers_name = $as_principal".to_string());
        let query = format!(
            "UPDATE group_entry SET {} WHERE dn = $dn AND ({}) RETURN AFTER",
            sets.join(", "),
            update.condition
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("dn", dn.to_string()))
            .bind(("as_principal", as_principal.map(Dn::to_string)));
        for (name, value) in update.params {
            builder = match value {
                BindValue::One(v) => builder.bind((name, v)),
                BindValue::Many(v) => builder.bind((name, v)),
            };
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, dn.as_str()))?;
        let rows: Vec<GroupEntryRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            debug!(session = %self.id, dn = %dn, "Directory modify matched no entry");
            return Err(DbError::NotFound {
                entity: "group".into(),
                id: dn.to_string(),
            }
            .into());
        }

        debug!(
            session = %self.id,
            dn = %dn,
            changes = changes.len(),
            "Directory entry modified"
        );
        Ok(())
    }

    async fn fetch_by_key(&self, dn: &Dn, attributes: &[&str]) -> GmsResult<Option<Entry>> {
        let query = format!("{SELECT_ENTRY} WHERE dn = $dn");
        let mut result = self
            .db
            .query(&query)
            .bind(("dn", dn.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupEntryRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| project(row.into_entry(), attributes)))
    }
}

/// An empty attribute list returns every attribute.
fn project(entry: Entry, attributes: &[&str]) -> Entry {
    if attributes.is_empty() {
        entry
    } else {
        entry.project(attributes)
    }
}
