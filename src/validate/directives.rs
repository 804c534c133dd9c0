//! Directive rules

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::location;
use crate::config::ProjectConfig;
use crate::constants::{
    ALL_LISTS_DIRECTIVE, APPEND_DIRECTIVE, FREE_FORM_DIRECTIVES, LOADING_DIRECTIVE,
    MASK_DISABLE_DIRECTIVE, MASK_ENABLE_DIRECTIVE, OPTIMISTIC_KEY_DIRECTIVE, PARENT_ID_DIRECTIVE,
    PREPEND_DIRECTIVE, REQUIRED_DIRECTIVE,
};
use crate::db::ir;
use crate::diagnostics::{Diagnostic, Diagnostics, Location};
use crate::types::{DocumentKind, TypeKind};

/// A selection carrying some directive, as placed in a document
struct Placed {
    selection: i64,
    document: i64,
    document_kind: DocumentKind,
    parent: Option<i64>,
    field_name: String,
    type_id: Option<String>,
    location: Location,
}

fn placed_with(conn: &Connection, directive: &str) -> Result<Vec<Placed>> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, r.document, d.kind, r.parent_id, s.field_name, s.type,
               d.raw_document, r.row, r.column
        FROM selection_directives sd
        JOIN selections s ON s.id = sd.selection_id
        JOIN selection_refs r ON r.child_id = s.id
        JOIN documents d ON d.id = r.document
        WHERE sd.directive = ?1
        ORDER BY r.document, s.id
        "#,
        params![directive],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                ir::enum_column(row, 2, DocumentKind::from_str)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, i64>(8)?,
            ))
        },
    )?;

    let mut placed = Vec::with_capacity(rows.len());
    for (selection, document, kind, parent, field_name, type_id, raw, row, column) in rows {
        placed.push(Placed {
            selection,
            document,
            document_kind: kind,
            parent,
            field_name,
            type_id,
            location: location(conn, raw, row, column)?,
        });
    }
    Ok(placed)
}

fn has_directive(conn: &Connection, selection: i64, directive: &str) -> Result<bool> {
    Ok(conn
        .prepare_cached(
            "SELECT 1 FROM selection_directives WHERE selection_id = ?1 AND directive = ?2 LIMIT 1",
        )?
        .query_row(params![selection, directive], |_| Ok(()))
        .optional()?
        .is_some())
}

fn child_has_directive(conn: &Connection, document: i64, parent: i64, directive: &str) -> Result<bool> {
    Ok(conn
        .prepare_cached(
            r#"
            SELECT 1 FROM selection_refs r
            JOIN selection_directives sd ON sd.selection_id = r.child_id
            WHERE r.document = ?1 AND r.parent_id = ?2 AND sd.directive = ?3
            LIMIT 1
            "#,
        )?
        .query_row(params![document, parent, directive], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Directives that are not declared anywhere
///
/// `<Type>_delete` is allowed for the node type of every discovered list.
pub fn validate_unknown_directives(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT sd.directive, d.raw_document, sd.row, sd.column
        FROM selection_directives sd
        JOIN selection_refs r ON r.child_id = sd.selection_id
        JOIN documents d ON d.id = r.document
        WHERE NOT EXISTS (SELECT 1 FROM directives x WHERE x.name = sd.directive)
          AND sd.directive NOT IN (SELECT node_type || '_delete' FROM discovered_lists)
        UNION ALL
        SELECT dd.directive, d.raw_document, dd.row, dd.column
        FROM document_directives dd
        JOIN documents d ON d.id = dd.document
        WHERE NOT EXISTS (SELECT 1 FROM directives x WHERE x.name = dd.directive)
        "#,
        [],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;

    let mut diagnostics = Diagnostics::new();
    for (directive, raw, row, column) in rows {
        diagnostics.push(Diagnostic::validation(
            format!("Unknown directive \"@{}\"", directive),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

/// Arguments passed to a declared directive must be declared on it
pub fn validate_known_directive_arguments(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let [with, when, when_not, arguments] = FREE_FORM_DIRECTIVES;
    let rows = ir::query_all(
        conn,
        r#"
        SELECT sd.directive, a.name, d.raw_document, a.row, a.column
        FROM selection_directive_arguments a
        JOIN selection_directives sd ON sd.id = a.parent
        JOIN selection_refs r ON r.child_id = sd.selection_id
        JOIN documents d ON d.id = r.document
        WHERE sd.directive NOT IN (?1, ?2, ?3, ?4)
          AND EXISTS (SELECT 1 FROM directives x WHERE x.name = sd.directive)
          AND NOT EXISTS (
              SELECT 1 FROM directive_arguments da WHERE da.parent = sd.directive AND da.name = a.name
          )
        UNION ALL
        SELECT dd.directive, a.name, d.raw_document, a.row, a.column
        FROM document_directive_arguments a
        JOIN document_directives dd ON dd.id = a.parent
        JOIN documents d ON d.id = dd.document
        WHERE dd.directive NOT IN (?1, ?2, ?3, ?4)
          AND EXISTS (SELECT 1 FROM directives x WHERE x.name = dd.directive)
          AND NOT EXISTS (
              SELECT 1 FROM directive_arguments da WHERE da.parent = dd.directive AND da.name = a.name
          )
        "#,
        params![with, when, when_not, arguments],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;

    let mut diagnostics = Diagnostics::new();
    for (directive, argument, raw, row, column) in rows {
        diagnostics.push(Diagnostic::validation(
            format!("Unknown argument \"{}\" on directive \"@{}\"", argument, directive),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

/// `@required` belongs on fields of object types, and a non-null field can
/// only carry it when one of its children does too
pub fn validate_required(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for placed in placed_with(conn, REQUIRED_DIRECTIVE)? {
        let Some(type_id) = &placed.type_id else {
            continue;
        };
        let parent = type_id.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("");
        if ir::type_kind(conn, parent)? != Some(TypeKind::Object) {
            diagnostics.push(Diagnostic::validation(
                format!("@required can only be used on fields of object types, not on {}", parent),
                placed.location,
            ));
            continue;
        }
        let Some(field) = ir::type_field(conn, type_id)? else {
            continue;
        };
        if field.is_non_null()
            && !child_has_directive(conn, placed.document, placed.selection, REQUIRED_DIRECTIVE)?
        {
            diagnostics.push(Diagnostic::validation(
                format!("@required can't be used on the non-null field {}", placed.field_name),
                placed.location,
            ));
        }
    }
    Ok(diagnostics)
}

pub fn validate_mask_directives(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for placed in placed_with(conn, MASK_ENABLE_DIRECTIVE)? {
        if has_directive(conn, placed.selection, MASK_DISABLE_DIRECTIVE)? {
            diagnostics.push(Diagnostic::validation(
                format!(
                    "{} can't use @{} and @{} together",
                    placed.field_name, MASK_ENABLE_DIRECTIVE, MASK_DISABLE_DIRECTIVE
                ),
                placed.location,
            ));
        }
    }
    Ok(diagnostics)
}

/// `@prepend`/`@append` and `@parentID`/`@allLists` exclude each other
pub fn validate_conflicting_directives(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for (first, second) in [
        (PREPEND_DIRECTIVE, APPEND_DIRECTIVE),
        (PARENT_ID_DIRECTIVE, ALL_LISTS_DIRECTIVE),
    ] {
        for placed in placed_with(conn, first)? {
            if has_directive(conn, placed.selection, second)? {
                diagnostics.push(Diagnostic::validation(
                    format!("@{} and @{} can't be used together", first, second),
                    placed.location,
                ));
            }
        }
    }
    Ok(diagnostics)
}

/// A nested `@loading` needs its parent to be loading too
pub fn validate_loading(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for placed in placed_with(conn, LOADING_DIRECTIVE)? {
        let Some(parent) = placed.parent else {
            continue;
        };
        if has_directive(conn, parent, LOADING_DIRECTIVE)?
            || ir::document_has_directive(conn, placed.document, LOADING_DIRECTIVE)?
        {
            continue;
        }
        diagnostics.push(Diagnostic::validation(
            format!("@loading on {} requires its parent to have @loading", placed.field_name),
            placed.location,
        ));
    }
    Ok(diagnostics)
}

pub fn validate_optimistic_key_scalar(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for placed in placed_with(conn, OPTIMISTIC_KEY_DIRECTIVE)? {
        let field = match &placed.type_id {
            Some(type_id) => ir::type_field(conn, type_id)?,
            None => None,
        };
        let Some(field) = field else {
            continue;
        };
        if ir::type_kind(conn, &field.name)? != Some(TypeKind::Scalar) {
            diagnostics.push(Diagnostic::validation(
                format!("@{} can only be used on scalar fields", OPTIMISTIC_KEY_DIRECTIVE),
                placed.location,
            ));
        }
    }
    Ok(diagnostics)
}

/// Optimistic keys live in mutations and cover every key of their type
pub fn validate_optimistic_key_selection(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    struct Group {
        kind: DocumentKind,
        parent_type: String,
        fields: BTreeSet<String>,
        location: Location,
    }

    let mut groups: BTreeMap<(i64, Option<i64>), Group> = BTreeMap::new();
    for placed in placed_with(conn, OPTIMISTIC_KEY_DIRECTIVE)? {
        let parent_type = placed
            .type_id
            .as_deref()
            .and_then(|id| id.rsplit_once('.'))
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default();
        groups
            .entry((placed.document, placed.parent))
            .or_insert_with(|| Group {
                kind: placed.document_kind,
                parent_type,
                fields: BTreeSet::new(),
                location: placed.location.clone(),
            })
            .fields
            .insert(placed.field_name);
    }

    let mut diagnostics = Diagnostics::new();
    for group in groups.into_values() {
        if group.kind != DocumentKind::Mutation {
            diagnostics.push(Diagnostic::validation(
                format!("@{} can only be used in mutations", OPTIMISTIC_KEY_DIRECTIVE),
                group.location,
            ));
            continue;
        }
        let keys: BTreeSet<String> = ir::type_keys(conn, &group.parent_type)?.into_iter().collect();
        if keys != group.fields {
            let keys: Vec<String> = keys.into_iter().collect();
            diagnostics.push(Diagnostic::validation(
                format!(
                    "@{} must be used on every key of {} ({})",
                    OPTIMISTIC_KEY_DIRECTIVE,
                    group.parent_type,
                    keys.join(", ")
                ),
                group.location,
            ));
        }
    }
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeConfig;
    use crate::validate::tests::{check, check_with};

    const FRAGMENT: &str = "fragment F on User { id }";

    #[test]
    fn test_unknown_directive() {
        assert_eq!(
            check(validate_unknown_directives, &["query Q @bogus { user { id @foo @include(if: true) } }"]).len(),
            2
        );
    }

    #[test]
    fn test_delete_directive_of_list_type_is_known() {
        let diagnostics = check(
            validate_unknown_directives,
            &[
                r#"query Q { users @list(name: "U") { id } }"#,
                r#"mutation M { updateUser(id: "1") { id @User_delete } }"#,
            ],
        );
        assert!(diagnostics.is_empty(), "{}", diagnostics);
    }

    #[test]
    fn test_directive_arguments() {
        let diagnostics = check(
            validate_known_directive_arguments,
            &[
                FRAGMENT,
                r#"query Q @cache(policy: NetworkOnly, ttl: 3) { users @list(name: "U", bogus: 1) { ...F @with(anything: 1) } }"#,
            ],
        );
        assert_eq!(diagnostics.len(), 2, "{}", diagnostics);
    }

    #[test]
    fn test_required_on_non_null_field() {
        let diagnostics = check(validate_required, &["query Q { user { id @required } }"]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_required_allowed() {
        let diagnostics = check(
            validate_required,
            &["query Q { ghost @required { name } users @required { firstName @required } }"],
        );
        assert!(diagnostics.is_empty(), "{}", diagnostics);
    }

    #[test]
    fn test_required_on_abstract_parent() {
        let diagnostics = check(validate_required, &[r#"query Q { node(id: "1") { id @required } }"#]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_mask_directives() {
        let diagnostics = check(
            validate_mask_directives,
            &[FRAGMENT, "query Q { user { ...F @mask_enable @mask_disable } }"],
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_conflicting_directives() {
        let diagnostics = check(
            validate_conflicting_directives,
            &[
                FRAGMENT,
                r#"query Q { user { ...F @prepend @append } ghost { believers { ...F @parentID(value: "1") @allLists } } }"#,
            ],
        );
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_loading() {
        assert_eq!(check(validate_loading, &["query Q { user { id @loading } }"]).len(), 1);
        assert!(check(validate_loading, &["query Q { user @loading { id @loading } }"]).is_empty());
        assert!(check(validate_loading, &["query Q @loading { user { id @loading } }"]).is_empty());
    }

    #[test]
    fn test_optimistic_key_on_object() {
        let diagnostics = check(
            validate_optimistic_key_scalar,
            &["mutation M { addFriend { id @optimisticKey friendsList @optimisticKey { id } } }"],
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_optimistic_key_selection() {
        assert!(check(
            validate_optimistic_key_selection,
            &[r#"mutation M { updateUser(id: "1") { id @optimisticKey firstName } }"#],
        )
        .is_empty());
        assert_eq!(
            check(
                validate_optimistic_key_selection,
                &["query Q { user { id @optimisticKey } }"]
            )
            .len(),
            1
        );

        let mut config = ProjectConfig::default();
        config.types.insert(
            "User".to_string(),
            TypeConfig {
                keys: Some(vec!["id".to_string(), "firstName".to_string()]),
                resolve_query: None,
            },
        );
        let diagnostics = check_with(
            validate_optimistic_key_selection,
            &[r#"mutation M { updateUser(id: "1") { id @optimisticKey firstName } }"#],
            &config,
        );
        assert_eq!(diagnostics.len(), 1);
    }
}
