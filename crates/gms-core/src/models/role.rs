//! Search role: the relationship between a principal and a group.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GmsError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// The principal is the group's owner.
    Owner,
    /// The principal is a direct member of the group.
    Member,
    /// The principal can read and write the group through a permission
    /// group it owns or belongs to.
    ReadWrite,
}

impl FromStr for Role {
    type Err = GmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "member" => Ok(Role::Member),
            "rw" | "readwrite" => Ok(Role::ReadWrite),
            other => Err(GmsError::invalid(format!("Unknown role {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "owner",
            Role::Member => "member",
            Role::ReadWrite => "rw",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_case_insensitively() {
        assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert_eq!("RW".parse::<Role>().unwrap(), Role::ReadWrite);
        assert_eq!("readwrite".parse::<Role>().unwrap(), Role::ReadWrite);
    }

    #[test]
    fn unknown_role_is_invalid_argument() {
        let err = "admin".parse::<Role>().unwrap_err();
        assert!(matches!(err, GmsError::InvalidArgument { .. }));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for role in [Role::Owner, Role::Member, Role::ReadWrite] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
