//! GMS Directory — the group engine: ACL encoding, membership diffs,
//! group lifecycle (create, reactivate, modify, tombstone) and role
//! search.

pub mod acl;
pub mod error;
pub mod group_directory;
pub mod membership;
pub mod service;

pub use acl::{AclCodec, AclPolicy};
pub use error::GroupError;
pub use group_directory::GroupDirectory;
pub use membership::{Membership, MembershipDelta};
pub use service::GroupService;
