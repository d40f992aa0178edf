//! GMS Database — SurrealDB-backed storage for the group directory.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The directory backend ([`SurrealDirectory`], a
//!   [`DirectoryConnector`](gms_core::directory::DirectoryConnector)
//!   whose sessions implement both `DirectorySession` and
//!   `PrincipalResolver`)
//! - The user store ([`repository::SurrealUserRepository`])
//! - Error types ([`DbError`])

mod connection;
pub mod directory;
mod error;
pub mod repository;
mod schema;

pub use connection::{Credentials, DbConfig, DbManager};
pub use directory::{SurrealDirectory, SurrealDirectorySession};
pub use error::{DbError, UNIQUE_VIOLATION};
pub use schema::{run_migrations, schema_v1};
