//! Repository trait definitions for data access abstraction.
//!
//! Users are owned by the identity layer; the group engine never writes
//! them. The repository exists so deployments and tests can provision
//! the identities that groups refer to.

use crate::error::GmsResult;
use crate::models::user::{CreateUser, User};

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = GmsResult<User>> + Send;
    fn get_by_username(&self, username: &str) -> impl Future<Output = GmsResult<User>> + Send;
}
