//! Directory layout configuration.

use crate::directory::Dn;
use crate::error::{GmsError, GmsResult};

/// Characters that may not appear in an RDN value without escaping.
const RDN_SPECIAL: &[char] = &[',', '=', '+', '<', '>', '#', ';', '\\', '"'];

/// Where groups and users live in the directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base DN of the group subtree (e.g., `ou=groups,dc=gms`).
    pub groups_dn: String,
    /// Base DN of the user subtree (e.g., `ou=people,dc=gms`).
    pub users_dn: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            groups_dn: "ou=groups,dc=gms".into(),
            users_dn: "ou=people,dc=gms".into(),
        }
    }
}

impl DirectoryConfig {
    pub fn groups_base(&self) -> Dn {
        Dn::new(self.groups_dn.clone())
    }

    pub fn users_base(&self) -> Dn {
        Dn::new(self.users_dn.clone())
    }

    /// Directory key of the group named `id`.
    pub fn group_dn(&self, id: &str) -> GmsResult<Dn> {
        validate_rdn_value(id, "group")?;
        Ok(Dn::new(format!("cn={id},{}", self.groups_dn)))
    }

    /// Directory key of the user named `username`.
    pub fn user_dn(&self, username: &str) -> GmsResult<Dn> {
        validate_rdn_value(username, "user")?;
        Ok(Dn::new(format!("uid={username},{}", self.users_dn)))
    }
}

fn validate_rdn_value(value: &str, entity: &str) -> GmsResult<()> {
    if value.trim().is_empty() {
        return Err(GmsError::invalid(format!("{entity} name must not be empty")));
    }
    if value.contains(RDN_SPECIAL) {
        return Err(GmsError::invalid(format!(
            "{value} not a valid {entity} name"
        )));
    }
    Ok(())
}
