//! Domain models for the group directory.
//!
//! These are the core types shared across all crates.

pub mod group;
pub mod role;
pub mod user;
