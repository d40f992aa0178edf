//! Error types for the group directory.
//!
//! Domain conditions (`NotFound`, `AlreadyExists`, `AccessDenied`,
//! `InvalidArgument`) reach the caller untouched. Backend failures are
//! classified as `Transient`. Violations of invariants the engine
//! established itself are not represented here: they panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GmsError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Transient directory error: {0}")]
    Transient(String),
}

impl GmsError {
    pub fn group_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "group".into(),
            id: id.into(),
        }
    }

    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "user".into(),
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// True for a missing group, as opposed to a missing user.
    pub fn is_group_not_found(&self) -> bool {
        matches!(self, Self::NotFound { entity, .. } if entity == "group")
    }

    /// True when the caller may retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type GmsResult<T> = Result<T, GmsError>;
