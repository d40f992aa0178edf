//! SurrealDB repository implementations.

mod user;

pub(crate) use user::PersonRowWithId;
pub use user::SurrealUserRepository;
