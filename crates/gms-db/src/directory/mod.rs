//! SurrealDB-backed directory: group entries, sessions and principal
//! resolution.

mod query;
mod resolver;
mod session;

pub use session::{SurrealDirectory, SurrealDirectorySession};
