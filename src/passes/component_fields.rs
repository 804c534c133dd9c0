//! Component fields
//!
//! A fragment tagged `@componentField(prop: "user", field: "Avatar")` on
//! `User` declares a virtual `User.Avatar` field. Discovery records it and
//! registers the field; the spread rewriter later turns every selection of
//! that field into a spread of the backing fragment.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::info;

use crate::constants::{
    component_field_fragment_name, COMPONENT_FIELD_DIRECTIVE, COMPONENT_FIELD_FIELD_ARG,
    COMPONENT_FIELD_PROP_ARG, COMPONENT_TYPE, WITH_DIRECTIVE,
};
use crate::db::ir;
use crate::diagnostics::{Diagnostic, Diagnostics, Location};
use crate::types::{DocumentKind, ValueKind};

struct Declaration {
    document: i64,
    name: String,
    type_condition: String,
    inline: bool,
    prop: Option<String>,
    field: Option<String>,
    location: Location,
}

/// Validate component field fragments and register their fields
pub fn discover_component_fields(conn: &Connection) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let rows = ir::query_all(
        conn,
        r#"
        SELECT d.id, d.name, d.type_condition, d.raw_document, dd.id, dd.row, dd.column,
               rd.inline_component_field
        FROM documents d
        JOIN document_directives dd ON dd.document = d.id
        JOIN raw_documents rd ON rd.id = d.raw_document
        WHERE d.kind = ?1 AND dd.directive = ?2
        ORDER BY d.id
        "#,
        params![DocumentKind::Fragment.as_str(), COMPONENT_FIELD_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, bool>(7)?,
            ))
        },
    )?;

    let mut declarations = Vec::with_capacity(rows.len());
    for (document, name, type_condition, raw, directive, row, column, inline) in rows {
        let location = ir::raw_location(conn, raw)?.at(row, column);
        let arguments = directive_string_arguments(conn, directive)?;
        declarations.push(Declaration {
            document,
            name,
            type_condition: type_condition.unwrap_or_default(),
            inline,
            prop: arguments.get(COMPONENT_FIELD_PROP_ARG).cloned(),
            field: arguments.get(COMPONENT_FIELD_FIELD_ARG).cloned(),
            location,
        });
    }

    // (type, prop, field) -> declarations, in document order
    let mut groups: Vec<((String, String, String), Vec<Declaration>)> = Vec::new();
    for declaration in declarations {
        let prop = declaration.prop.clone().unwrap_or_default();
        if prop.is_empty() {
            diagnostics.push(Diagnostic::validation(
                format!("Component field {} needs a prop", declaration.name),
                declaration.location.clone(),
            ));
            continue;
        }
        let Some(field) = declaration.field.clone().filter(|f| !f.is_empty()) else {
            diagnostics.push(Diagnostic::validation(
                format!("Component field {} needs a field name", declaration.name),
                declaration.location.clone(),
            ));
            continue;
        };

        match ir::type_kind(conn, &declaration.type_condition)? {
            Some(kind) if !kind.is_abstract() => {}
            Some(_) => {
                diagnostics.push(Diagnostic::validation(
                    format!(
                        "Component fields can't be declared on the abstract type {}",
                        declaration.type_condition
                    ),
                    declaration.location.clone(),
                ));
                continue;
            }
            None => {
                diagnostics.push(Diagnostic::validation(
                    format!("Unknown type {}", declaration.type_condition),
                    declaration.location.clone(),
                ));
                continue;
            }
        }

        let key = (declaration.type_condition.clone(), prop, field);
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, group)) => group.push(declaration),
            None => groups.push((key, vec![declaration])),
        }
    }

    let mut registered_fields: HashSet<String> = HashSet::new();
    let mut registered = 0;
    for ((type_name, prop, field), group) in groups {
        let field_id = format!("{}.{}", type_name, field);
        if group.len() > 1 {
            let mut duplicate = Diagnostic::validation(
                format!("Duplicate component field {} for prop {}", field_id, prop),
                group[0].location.clone(),
            );
            for declaration in &group[1..] {
                duplicate = duplicate.at(declaration.location.clone());
            }
            diagnostics.push(duplicate);
        }
        // The first declaration stands in for the group
        let Some(declaration) = group.into_iter().next() else {
            continue;
        };

        if !registered_fields.contains(&field_id) && ir::type_field(conn, &field_id)?.is_some() {
            diagnostics.push(Diagnostic::validation(
                format!("{} already has a field named {}", type_name, field),
                declaration.location.clone(),
            ));
            continue;
        }

        let fragment_name = component_field_fragment_name(&type_name, &field);
        if declaration.name != fragment_name {
            rename_fragment(conn, declaration.document, &declaration.name, &fragment_name)?;
        }

        conn.prepare_cached(
            r#"
            INSERT INTO component_fields (document, prop, field, type, inline)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(document) DO UPDATE SET
                prop = excluded.prop, field = excluded.field,
                type = excluded.type, inline = excluded.inline
            "#,
        )?
        .execute(params![declaration.document, prop, field, type_name, declaration.inline])?;

        // Another prop may already have registered the same field
        conn.prepare_cached(
            r#"
            INSERT OR IGNORE INTO type_fields (id, parent, name, type, type_modifiers, internal)
            VALUES (?1, ?2, ?3, ?4, '', 1)
            "#,
        )?
        .execute(params![field_id, type_name, field, COMPONENT_TYPE])?;
        registered_fields.insert(field_id);
        registered += 1;
    }

    info!("Registered {} component fields", registered);
    Ok(diagnostics)
}

/// Component field fragments are addressed by their derived name
fn rename_fragment(conn: &Connection, document: i64, from: &str, to: &str) -> Result<()> {
    conn.prepare_cached("UPDATE documents SET name = ?1 WHERE id = ?2")?
        .execute(params![to, document])?;
    conn.prepare_cached(
        "UPDATE selections SET field_name = ?1 WHERE kind = 'fragment' AND field_name = ?2",
    )?
    .execute(params![to, from])?;
    Ok(())
}

fn directive_string_arguments(conn: &Connection, directive: i64) -> Result<HashMap<String, String>> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT a.name, v.kind, v.raw FROM document_directive_arguments a
        JOIN argument_values v ON v.id = a.value
        WHERE a.parent = ?1
        "#,
        params![directive],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
    )?;
    Ok(rows
        .into_iter()
        .filter(|(_, kind, _)| kind == ValueKind::String.as_str() || kind == ValueKind::Block.as_str())
        .map(|(name, _, raw)| (name, raw))
        .collect())
}

/// Replace selections of component fields with spreads of their fragments
///
/// Field arguments move to a `@with` directive on the spread, pointing at
/// the same values.
pub fn rewrite_component_field_spreads(conn: &Connection) -> Result<usize> {
    let selections = ir::query_all(
        conn,
        r#"
        SELECT s.id, cf.type, cf.field,
               (SELECT r.row FROM selection_refs r WHERE r.child_id = s.id ORDER BY r.id LIMIT 1),
               (SELECT r.column FROM selection_refs r WHERE r.child_id = s.id ORDER BY r.id LIMIT 1)
        FROM selections s
        JOIN component_fields cf ON s.type = cf.type || '.' || cf.field
        WHERE s.kind = 'field'
        "#,
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            ))
        },
    )?;

    for (selection, type_name, field, row, column) in &selections {
        conn.prepare_cached(
            r#"
            UPDATE selections SET kind = 'fragment', field_name = ?1, alias = NULL, type = NULL
            WHERE id = ?2
            "#,
        )?
        .execute(params![component_field_fragment_name(type_name, field), selection])?;

        let arguments = ir::query_all(
            conn,
            "SELECT id, name, value, row, column FROM selection_arguments WHERE selection_id = ?1 ORDER BY id",
            params![selection],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )?;
        if arguments.is_empty() {
            continue;
        }

        let with = ir::insert_selection_directive(conn, *selection, WITH_DIRECTIVE, (*row, *column))?;
        for (id, name, value, row, column) in arguments {
            ir::insert_selection_directive_argument(conn, with, &name, value, (row, column))?;
            conn.prepare_cached("DELETE FROM selection_arguments WHERE id = ?1")?
                .execute(params![id])?;
        }
    }

    info!("Rewrote {} component field selections", selections.len());
    Ok(selections.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::compile_until_loaded;

    const SCHEMA: &str = r#"
        type User { id: ID!, firstName: String, avatar(size: Int): String! }
        union Friend = User
        type Query { user: User }
    "#;

    #[test]
    fn test_component_field_is_registered() {
        let store = compile_until_loaded(
            SCHEMA,
            &[r#"fragment UserAvatar on User @componentField(field: "Avatar", prop: "user") { avatar }"#],
        );
        let conn = store.connection().unwrap();
        let diagnostics = discover_component_fields(&conn).unwrap();
        assert!(diagnostics.is_empty(), "{}", diagnostics);

        let field = ir::type_field(&conn, "User.Avatar").unwrap().unwrap();
        assert_eq!(field.name, "Component");
        assert!(ir::find_document(&conn, "__componentField__User_Avatar", DocumentKind::Fragment)
            .unwrap()
            .is_some());
        let prop: String = conn
            .query_row("SELECT prop FROM component_fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(prop, "user");
    }

    #[test]
    fn test_abstract_type_is_rejected() {
        let store = compile_until_loaded(
            SCHEMA,
            &[r#"fragment F on Friend @componentField(field: "firstName", prop: "user") { __typename }"#],
        );
        let conn = store.connection().unwrap();
        let diagnostics = discover_component_fields(&conn).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(ir::type_field(&conn, "Friend.firstName").unwrap().is_none());
    }

    #[test]
    fn test_existing_field_and_missing_prop() {
        let store = compile_until_loaded(
            SCHEMA,
            &[
                r#"fragment A on User @componentField(field: "firstName", prop: "user") { id }"#,
                r#"fragment B on User @componentField(field: "Other") { id }"#,
            ],
        );
        let conn = store.connection().unwrap();
        assert_eq!(discover_component_fields(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_component_fields() {
        let store = compile_until_loaded(
            SCHEMA,
            &[
                r#"fragment A on User @componentField(field: "Avatar", prop: "user") { id }"#,
                r#"fragment B on User @componentField(field: "Avatar", prop: "user") { id }"#,
                r#"fragment C on User @componentField(field: "Avatar", prop: "user") { firstName }"#,
            ],
        );
        let conn = store.connection().unwrap();
        let diagnostics = discover_component_fields(&conn).unwrap();
        assert_eq!(diagnostics.len(), 1, "{}", diagnostics);
        let duplicate = &diagnostics.as_slice()[0];
        assert!(duplicate.message.contains("Duplicate component field User.Avatar"));
        assert_eq!(duplicate.locations.len(), 3);
        assert!(ir::type_field(&conn, "User.Avatar").unwrap().is_some());
    }

    #[test]
    fn test_same_field_for_another_prop_is_not_a_duplicate() {
        let store = compile_until_loaded(
            SCHEMA,
            &[
                r#"fragment A on User @componentField(field: "Avatar", prop: "user") { id }"#,
                r#"fragment B on User @componentField(field: "Avatar", prop: "viewer") { id }"#,
            ],
        );
        let conn = store.connection().unwrap();
        let diagnostics = discover_component_fields(&conn).unwrap();
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let props: i64 = conn
            .query_row("SELECT COUNT(*) FROM component_fields WHERE field = 'Avatar'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(props, 2);
    }

    #[test]
    fn test_spread_rewrite_moves_arguments_to_with() {
        let store = compile_until_loaded(
            SCHEMA,
            &[
                r#"fragment UserAvatar on User @componentField(field: "Avatar", prop: "user") @arguments(size: { type: "Int" }) { avatar(size: $size) }"#,
                "query Q { user { Avatar(size: 100) } }",
            ],
        );
        let conn = store.connection().unwrap();
        assert!(discover_component_fields(&conn).unwrap().is_empty());
        assert_eq!(rewrite_component_field_spreads(&conn).unwrap(), 1);

        let query = ir::find_document(&conn, "Q", DocumentKind::Query).unwrap().unwrap();
        let tree = ir::selection_tree(&conn, query.id).unwrap();
        let spread = &tree[0].children[0];
        assert_eq!(spread.field_name, "__componentField__User_Avatar");
        assert!(spread.arguments.is_empty());
        let with = spread.directive("with").unwrap();
        assert_eq!(with.arguments[0].0, "size");
        assert_eq!(with.arguments[0].1.raw, "100");
    }
}
