//! Group engine error types.

use std::fmt;

use gms_core::error::GmsError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group {0} requires an owner")]
    MissingOwner(String),

    #[error("group {0} carries unsupported properties")]
    UnsupportedProperties(String),

    #[error("group {id} cannot reference itself as {field}")]
    SelfReference { id: String, field: &'static str },

    #[error("{caller} does not own the inactive group {id}")]
    NotTombstoneOwner { id: String, caller: String },
}

impl From<GroupError> for GmsError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::NotTombstoneOwner { .. } => GmsError::AccessDenied {
                reason: err.to_string(),
            },
            GroupError::MissingOwner(_)
            | GroupError::UnsupportedProperties(_)
            | GroupError::SelfReference { .. } => GmsError::InvalidArgument {
                message: err.to_string(),
            },
        }
    }
}

/// Abort on a broken internal invariant. These are defects, never
/// recoverable errors.
#[track_caller]
pub(crate) fn bug(message: impl fmt::Display) -> ! {
    error!(%message, "Directory invariant violated");
    panic!("BUG: {message}")
}
