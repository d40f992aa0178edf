//! Translation between a group's access policy and the ACL statements
//! stored on its directory entry.
//!
//! A policy is at most three statements: one delegating read to a
//! permission group, one delegating write to a permission group, and a
//! static public-read statement. Each delegation names the permission
//! group by its directory key.

use gms_core::directory::Dn;
use gms_core::models::group::GroupRef;

use crate::error::bug;

const GROUP_PLACEHOLDER: &str = "<ACTUAL_GROUP>";

const READ_TEMPLATE: &str = "(targetattr = \"*\") (version 3.0;acl \"Group Read\";\
allow (read,compare,search)(groupdn = \"ldap:///<ACTUAL_GROUP>\");)";

const WRITE_TEMPLATE: &str = "(targetattr = \"*\") (version 3.0;acl \"Group Write\";\
allow (read,compare,search,selfwrite,write,add)(groupdn = \"ldap:///<ACTUAL_GROUP>\");)";

/// Grants read to everyone.
pub const PUBLIC_STATEMENT: &str = "(targetattr = \"*\") (version 3.0;acl \"Group Public\";\
allow (read,compare,search)userdn=\"ldap:///all\";)";

const READ_MARKER: &str = "Group Read";
const WRITE_MARKER: &str = "Group Write";

/// The access policy of a group as carried by its ACL statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclPolicy {
    pub public_read: bool,
    pub group_read: Option<GroupRef>,
    pub group_write: Option<GroupRef>,
}

pub struct AclCodec;

impl AclCodec {
    /// Statement delegating read access to the group at `group`.
    pub fn read_statement(group: &Dn) -> String {
        READ_TEMPLATE.replace(GROUP_PLACEHOLDER, group.as_str())
    }

    /// Statement delegating read and write access to the group at `group`.
    pub fn write_statement(group: &Dn) -> String {
        WRITE_TEMPLATE.replace(GROUP_PLACEHOLDER, group.as_str())
    }

    /// Encode a policy in the order read, write, public.
    pub fn encode(public_read: bool, read: Option<&Dn>, write: Option<&Dn>) -> Vec<String> {
        let mut statements = Vec::with_capacity(3);
        if let Some(dn) = read {
            statements.push(Self::read_statement(dn));
        }
        if let Some(dn) = write {
            statements.push(Self::write_statement(dn));
        }
        if public_read {
            statements.push(PUBLIC_STATEMENT.to_string());
        }
        statements
    }

    /// Decode the statements of one entry. Later statements of the same
    /// kind overwrite earlier ones; statements of unknown shape are
    /// skipped.
    ///
    /// # Panics
    ///
    /// If a read or write statement does not name a group.
    pub fn decode(statements: &[String]) -> AclPolicy {
        let mut policy = AclPolicy::default();
        for statement in statements {
            if statement == PUBLIC_STATEMENT {
                policy.public_read = true;
            } else if statement.contains(READ_MARKER) {
                policy.group_read = Some(GroupRef::new(referenced_group(statement)));
            } else if statement.contains(WRITE_MARKER) {
                policy.group_write = Some(GroupRef::new(referenced_group(statement)));
            }
        }
        policy
    }
}

/// The `cn` value of the directory reference embedded in `statement`.
fn referenced_group(statement: &str) -> &str {
    let id = statement
        .split_once("ldap:///")
        .and_then(|(_, reference)| reference.split_once("cn="))
        .and_then(|(_, rest)| rest.split_once(','))
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty());
    match id {
        Some(id) => id,
        None => bug(format!("unparsable ACL statement: {statement}")),
    }
}
