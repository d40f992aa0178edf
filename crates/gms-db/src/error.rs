//! Database-specific error types and conversions.

use gms_core::error::GmsError;

/// Fragment of SurrealDB's unique-index violation message.
pub const UNIQUE_VIOLATION: &str = "already contains";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entry already exists: {0}")]
    EntryExists(String),

    #[error("Unsupported directory request: {0}")]
    Unsupported(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl DbError {
    /// Classify a failed statement. Unique-index violations surface as
    /// `EntryExists`, everything else stays a backend failure.
    ///
    /// Callers check for an existing entry before writing; this only
    /// catches a writer that slipped in between. SurrealDB reports the
    /// violation as text ("Database index `..` already contains ..");
    /// `tests/schema_test.rs` pins that wording.
    pub(crate) fn from_statement(err: surrealdb::Error, dn: &str) -> Self {
        if err.to_string().contains(UNIQUE_VIOLATION) {
            DbError::EntryExists(dn.to_string())
        } else {
            DbError::Surreal(err)
        }
    }
}

impl From<DbError> for GmsError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GmsError::NotFound { entity, id },
            DbError::EntryExists(id) => GmsError::AlreadyExists {
                entity: "entry".into(),
                id,
            },
            DbError::Unsupported(message) => GmsError::InvalidArgument { message },
            other => GmsError::Transient(other.to_string()),
        }
    }
}
