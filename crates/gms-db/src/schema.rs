//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity. Group
//! entries keep one column per directory attribute; multi-valued
//! attributes are arrays of strings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_directory",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — directory tables
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users (identities referenced by group owners and members)
-- =======================================================================
DEFINE TABLE person SCHEMAFULL;
DEFINE FIELD username ON TABLE person TYPE string;
DEFINE FIELD dn ON TABLE person TYPE string;
DEFINE FIELD display_name ON TABLE person TYPE option<string>;
DEFINE FIELD created_at ON TABLE person TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_person_username ON TABLE person \
    COLUMNS username UNIQUE;
DEFINE INDEX idx_person_dn ON TABLE person COLUMNS dn UNIQUE;

-- =======================================================================
-- Group entries (active groups and tombstones)
-- =======================================================================
DEFINE TABLE group_entry SCHEMAFULL;
DEFINE FIELD dn ON TABLE group_entry TYPE string;
DEFINE FIELD object_class ON TABLE group_entry TYPE array<string> \
    DEFAULT [];
DEFINE FIELD cn ON TABLE group_entry TYPE string;
DEFINE FIELD description ON TABLE group_entry TYPE option<string>;
DEFINE FIELD owner ON TABLE group_entry TYPE string;
DEFINE FIELD aci ON TABLE group_entry TYPE array<string> DEFAULT [];
DEFINE FIELD unique_member ON TABLE group_entry TYPE array<string> \
    DEFAULT [];
DEFINE FIELD account_lock ON TABLE group_entry TYPE option<string>;
DEFINE FIELD creators_name ON TABLE group_entry TYPE option<string>;
DEFINE FIELD modifiers_name ON TABLE group_entry TYPE option<string>;
DEFINE FIELD modify_timestamp ON TABLE group_entry TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_entry_dn ON TABLE group_entry COLUMNS dn UNIQUE;
DEFINE INDEX idx_group_entry_cn ON TABLE group_entry COLUMNS cn;
DEFINE INDEX idx_group_entry_owner ON TABLE group_entry COLUMNS owner;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
