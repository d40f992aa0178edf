//! GMS Core — domain models, error taxonomy, configuration and the
//! directory traits shared by the backend and the group engine.

pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod repository;

pub use config::DirectoryConfig;
pub use error::{GmsError, GmsResult};
