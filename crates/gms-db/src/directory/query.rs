//! Translation of directory filters and modifications into SurrealQL.
//!
//! Every attribute of a group entry maps to one column of the
//! `group_entry` table. Values are always bound as parameters, never
//! interpolated.

use gms_core::directory::{Filter, Modification, ModificationKind, attr};

use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Column {
    ObjectClass,
    Cn,
    Description,
    Owner,
    Aci,
    UniqueMember,
    AccountLock,
    ModifyTimestamp,
    ModifiersName,
    CreatorsName,
    EntryDn,
}

impl Column {
    pub(crate) fn for_attribute(name: &str) -> Result<Self, DbError> {
        let column = match name.to_ascii_lowercase().as_str() {
            attr::OBJECT_CLASS => Column::ObjectClass,
            attr::CN => Column::Cn,
            attr::DESCRIPTION => Column::Description,
            attr::OWNER => Column::Owner,
            attr::ACI => Column::Aci,
            attr::UNIQUE_MEMBER => Column::UniqueMember,
            attr::ACCOUNT_LOCK => Column::AccountLock,
            attr::MODIFY_TIMESTAMP => Column::ModifyTimestamp,
            attr::MODIFIERS_NAME => Column::ModifiersName,
            attr::CREATORS_NAME => Column::CreatorsName,
            attr::ENTRY_DN => Column::EntryDn,
            other => {
                return Err(DbError::Unsupported(format!(
                    "unknown attribute {other}"
                )));
            }
        };
        Ok(column)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Column::ObjectClass => "object_class",
            Column::Cn => "cn",
            Column::Description => "description",
            Column::Owner => "owner",
            Column::Aci => "aci",
            Column::UniqueMember => "unique_member",
            Column::AccountLock => "account_lock",
            Column::ModifyTimestamp => "modify_timestamp",
            Column::ModifiersName => "modifiers_name",
            Column::CreatorsName => "creators_name",
            Column::EntryDn => "dn",
        }
    }

    pub(crate) fn is_multi_valued(self) -> bool {
        matches!(
            self,
            Column::ObjectClass | Column::Aci | Column::UniqueMember
        )
    }

    /// Single-valued columns that may be absent.
    fn is_optional(self) -> bool {
        matches!(
            self,
            Column::Description
                | Column::AccountLock
                | Column::ModifiersName
                | Column::CreatorsName
        )
    }

    /// Columns a client may set through add or modify.
    pub(crate) fn is_user_writable(self) -> bool {
        !matches!(
            self,
            Column::ModifyTimestamp
                | Column::ModifiersName
                | Column::CreatorsName
                | Column::EntryDn
        )
    }
}

/// A value bound to a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindValue {
    One(String),
    Many(Vec<String>),
}

/// A SurrealQL fragment plus the parameters it references.
#[derive(Debug, Default)]
pub(crate) struct Compiled {
    pub(crate) sql: String,
    pub(crate) params: Vec<(String, BindValue)>,
}

impl Compiled {
    fn bind(&mut self, value: BindValue) -> String {
        let name = format!("p{}", self.params.len());
        self.params.push((name.clone(), value));
        format!("${name}")
    }
}

/// Compile `filter` into a `WHERE` condition.
pub(crate) fn compile_filter(filter: &Filter) -> Result<Compiled, DbError> {
    let mut compiled = Compiled::default();
    compiled.sql = filter_clause(filter, &mut compiled)?;
    Ok(compiled)
}

fn filter_clause(filter: &Filter, out: &mut Compiled) -> Result<String, DbError> {
    match filter {
        Filter::Equals(name, value) => {
            let column = Column::for_attribute(name)?;
            if column == Column::ModifyTimestamp {
                return Err(DbError::Unsupported(
                    "equality on modifytimestamp".into(),
                ));
            }
            let param = out.bind(BindValue::One(value.clone()));
            if column.is_multi_valued() {
                Ok(format!("{} CONTAINS {param}", column.name()))
            } else {
                Ok(format!("{} = {param}", column.name()))
            }
        }
        Filter::Present(name) => {
            let column = Column::for_attribute(name)?;
            if column.is_multi_valued() {
                Ok(format!("array::len({}) > 0", column.name()))
            } else if column.is_optional() {
                Ok(format!("{} != NONE", column.name()))
            } else {
                Ok("true".into())
            }
        }
        Filter::And(filters) => join(filters, " AND ", "true", out),
        Filter::Or(filters) => join(filters, " OR ", "false", out),
        Filter::Not(inner) => Ok(format!("!({})", filter_clause(inner, out)?)),
    }
}

fn join(
    filters: &[Filter],
    separator: &str,
    empty: &str,
    out: &mut Compiled,
) -> Result<String, DbError> {
    if filters.is_empty() {
        return Ok(empty.into());
    }
    let parts = filters
        .iter()
        .map(|f| filter_clause(f, out).map(|clause| format!("({clause})")))
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(parts.join(separator))
}

/// The pieces of a conditional `UPDATE`: one assignment per touched
/// column and the precondition the stored entry must satisfy. Both share
/// one parameter namespace.
#[derive(Debug, Default)]
pub(crate) struct CompiledUpdate {
    pub(crate) assignments: Vec<String>,
    pub(crate) condition: String,
    pub(crate) params: Vec<(String, BindValue)>,
}

/// Compile `changes` and `precondition` for a single `UPDATE` statement.
pub(crate) fn compile_update(
    changes: &[Modification],
    precondition: &Filter,
) -> Result<CompiledUpdate, DbError> {
    let mut compiled = Compiled::default();
    let assignments = compile_assignments(changes, &mut compiled)?;
    let condition = filter_clause(precondition, &mut compiled)?;
    Ok(CompiledUpdate {
        assignments,
        condition,
        params: compiled.params,
    })
}

/// Changes to the same column are folded into one expression, applied
/// in request order.
fn compile_assignments(
    changes: &[Modification],
    out: &mut Compiled,
) -> Result<Vec<String>, DbError> {
    let mut columns: Vec<(Column, String)> = Vec::new();
    for change in changes {
        let column = Column::for_attribute(&change.attribute)?;
        if !column.is_user_writable() || column == Column::Cn {
            return Err(DbError::Unsupported(format!(
                "attribute {} cannot be modified",
                change.attribute
            )));
        }
        match columns.iter().position(|(c, _)| *c == column) {
            Some(i) => {
                let expr = expression(change, column, &columns[i].1, out)?;
                columns[i].1 = expr;
            }
            None => {
                let expr = expression(change, column, column.name(), out)?;
                columns.push((column, expr));
            }
        }
    }
    Ok(columns
        .into_iter()
        .map(|(column, expr)| format!("{} = {expr}", column.name()))
        .collect())
}

/// New value of `column` after applying `change` to `current`.
fn expression(
    change: &Modification,
    column: Column,
    current: &str,
    out: &mut Compiled,
) -> Result<String, DbError> {
    let values = &change.values;

    if column.is_multi_valued() {
        return match change.kind {
            ModificationKind::Add if values.is_empty() => Err(DbError::Unsupported(format!(
                "add to {} without values",
                change.attribute
            ))),
            ModificationKind::Add => {
                let param = out.bind(BindValue::Many(values.clone()));
                Ok(format!("array::union({current}, {param})"))
            }
            ModificationKind::Delete if values.is_empty() => Ok("[]".into()),
            ModificationKind::Delete => {
                let param = out.bind(BindValue::Many(values.clone()));
                Ok(format!("array::complement({current}, {param})"))
            }
            ModificationKind::Replace => Ok(out.bind(BindValue::Many(values.clone()))),
        };
    }

    if values.len() > 1 {
        return Err(DbError::Unsupported(format!(
            "{} is single-valued",
            change.attribute
        )));
    }

    match (change.kind, values.first()) {
        (ModificationKind::Add | ModificationKind::Replace, Some(value)) => {
            Ok(out.bind(BindValue::One(value.clone())))
        }
        (ModificationKind::Add, None) => Err(DbError::Unsupported(format!(
            "add to {} without values",
            change.attribute
        ))),
        (ModificationKind::Delete | ModificationKind::Replace, _) if column.is_optional() => {
            Ok("NONE".into())
        }
        _ => Err(DbError::Unsupported(format!(
            "{} is required",
            change.attribute
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gms_core::directory::{LOCKED, attr};

    #[test]
    fn active_lookup_compiles_to_negated_lock_check() {
        let filter = Filter::eq(attr::CN, "data-team").active();
        let compiled = compile_filter(&filter).unwrap();
        assert_eq!(compiled.sql, "(cn = $p0) AND (!(account_lock = $p1))");
        assert_eq!(
            compiled.params,
            vec![
                ("p0".to_string(), BindValue::One("data-team".into())),
                ("p1".to_string(), BindValue::One(LOCKED.into())),
            ]
        );
    }

    #[test]
    fn multi_valued_equality_uses_contains() {
        let filter = Filter::or(vec![
            Filter::and(vec![Filter::eq(attr::ACI, "r"), Filter::eq(attr::ACI, "w")]),
            Filter::eq(attr::UNIQUE_MEMBER, "uid=a"),
        ]);
        let compiled = compile_filter(&filter).unwrap();
        assert_eq!(
            compiled.sql,
            "((aci CONTAINS $p0) AND (aci CONTAINS $p1)) OR (unique_member CONTAINS $p2)"
        );
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn empty_boolean_filters_have_identity_values() {
        assert_eq!(compile_filter(&Filter::and(vec![])).unwrap().sql, "true");
        assert_eq!(compile_filter(&Filter::or(vec![])).unwrap().sql, "false");
    }

    #[test]
    fn presence_depends_on_column_shape() {
        assert_eq!(
            compile_filter(&Filter::present(attr::ACI)).unwrap().sql,
            "array::len(aci) > 0"
        );
        assert_eq!(
            compile_filter(&Filter::present(attr::DESCRIPTION))
                .unwrap()
                .sql,
            "description != NONE"
        );
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        assert!(matches!(
            compile_filter(&Filter::eq("mail", "x")),
            Err(DbError::Unsupported(_))
        ));
    }

    #[test]
    fn member_delta_folds_into_one_assignment_per_column() {
        let changes = vec![
            Modification::add(attr::UNIQUE_MEMBER, vec!["uid=c".into()]),
            Modification::delete(attr::UNIQUE_MEMBER, vec!["uid=b".into()]),
            Modification::delete_all(attr::DESCRIPTION),
            Modification::replace(attr::ACI, vec![]),
        ];
        let update = compile_update(&changes, &Filter::present(attr::CN)).unwrap();
        assert_eq!(
            update.assignments,
            vec![
                "unique_member = array::complement(array::union(unique_member, $p0), $p1)",
                "description = NONE",
                "aci = $p2",
            ]
        );
        assert_eq!(update.condition, "true");
        assert_eq!(update.params.len(), 3);
    }

    #[test]
    fn precondition_params_follow_assignment_params() {
        let changes = vec![Modification::add(attr::DESCRIPTION, vec!["d".into()])];
        let precondition = Filter::eq(attr::OBJECT_CLASS, "groupofuniquenames").active();
        let update = compile_update(&changes, &precondition).unwrap();
        assert_eq!(update.assignments, vec!["description = $p0"]);
        assert_eq!(
            update.condition,
            "(object_class CONTAINS $p1) AND (!(account_lock = $p2))"
        );
        assert_eq!(
            update.params.last(),
            Some(&("p2".to_string(), BindValue::One(LOCKED.into())))
        );
    }

    #[test]
    fn lock_then_unlock_keeps_last_value() {
        let changes = vec![
            Modification::add(attr::ACCOUNT_LOCK, vec![LOCKED.into()]),
            Modification::delete_all(attr::ACCOUNT_LOCK),
        ];
        let update = compile_update(&changes, &Filter::and(vec![])).unwrap();
        assert_eq!(update.assignments, vec!["account_lock = NONE"]);
    }

    #[test]
    fn operational_and_required_attributes_are_protected() {
        let any = Filter::and(vec![]);
        assert!(
            compile_update(
                &[Modification::replace(attr::MODIFY_TIMESTAMP, vec!["x".into()])],
                &any
            )
            .is_err()
        );
        assert!(compile_update(&[Modification::delete_all(attr::OWNER)], &any).is_err());
        assert!(
            compile_update(&[Modification::replace(attr::CN, vec!["x".into()])], &any).is_err()
        );
        assert!(
            compile_update(
                &[Modification::add(
                    attr::DESCRIPTION,
                    vec!["a".into(), "b".into()]
                )],
                &any
            )
            .is_err()
        );
    }
}
