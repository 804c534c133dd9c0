//! List discovery
//!
//! Finds every field tagged `@list` or `@paginate` and records its shape:
//! either a plain list (`[User!]!`) or a connection (`edges { node }`).

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::config::ProjectConfig;
use crate::constants::{
    LIST_DIRECTIVE, LIST_NAME_ARG, PAGINATE_DIRECTIVE, PAGINATE_MODE_ARG, PAGINATE_NAME_ARG,
};
use crate::db::ir::{self, TypeRef};
use crate::diagnostics::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::types::{DiscoveredList, DocumentKind, PaginateMode, PaginationDirection, ValueKind};
use crate::values::ArgumentValue;

/// Arguments that carry a page size, in lookup order
const PAGE_SIZE_ARGS: [&str; 3] = ["first", "last", "limit"];

struct Tagged {
    selection: i64,
    document: i64,
    raw_document: i64,
    embedded: bool,
    field_name: String,
    parent_type: Option<String>,
    return_type: Option<TypeRef>,
    location: Location,
}

/// Discover lists and store one `discovered_lists` row per tagged field
pub fn discover_lists(conn: &Connection, config: &ProjectConfig) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let tagged = tagged_selections(conn)?;
    let mut names: BTreeMap<String, Vec<Location>> = BTreeMap::new();
    let mut discovered = 0;

    for field in tagged {
        let Some(return_type) = &field.return_type else {
            // Unknown fields are reported by validation
            continue;
        };
        let parent_type = field.parent_type.clone().unwrap_or_default();

        let directives = ir::selection_directives(conn, field.selection)?;
        let list = directives.iter().find(|d| d.name == LIST_DIRECTIVE);
        let paginate = directives.iter().find(|d| d.name == PAGINATE_DIRECTIVE);
        let name = list
            .and_then(|d| argument_raw(&d.arguments, LIST_NAME_ARG))
            .or_else(|| paginate.and_then(|d| argument_raw(&d.arguments, PAGINATE_NAME_ARG)))
            .unwrap_or_default();
        let mode = paginate
            .and_then(|d| argument_raw(&d.arguments, PAGINATE_MODE_ARG))
            .and_then(|raw| PaginateMode::from_str(&raw))
            .unwrap_or(config.default_paginate_mode);

        let connection = !return_type.is_list();
        let (node_type, edge_type, connection_type, node) = if connection {
            let shape = connection_shape(conn, &return_type.name)?;
            let Some((edge_type, node_type)) = shape else {
                diagnostics.push(Diagnostic::validation(
                    format!(
                        "{} must return a list or a connection to be used as a list",
                        field.field_name
                    ),
                    field.location.clone(),
                ));
                continue;
            };
            let node = match child_field(conn, field.document, field.selection, "edges")? {
                Some(edges) => child_field(conn, field.document, edges, "node")?,
                None => None,
            };
            let Some(node) = node else {
                diagnostics.push(Diagnostic::validation(
                    format!(
                        "The connection {} must select edges {{ node }} to be used as a list",
                        field.field_name
                    ),
                    field.location.clone(),
                ));
                continue;
            };
            (node_type, Some(edge_type), Some(return_type.name.clone()), node)
        } else {
            match ir::type_kind(conn, &return_type.name)? {
                Some(kind) if kind.is_composite() => {}
                _ => {
                    diagnostics.push(Diagnostic::validation(
                        format!(
                            "{} must return a list of objects to be used as a list",
                            field.field_name
                        ),
                        field.location.clone(),
                    ));
                    continue;
                }
            }
            (return_type.name.clone(), None, None, field.selection)
        };

        let page_size = page_size(conn, field.document, field.selection)?;

        conn.prepare_cached(
            r#"
            INSERT INTO discovered_lists (
                name, node_type, edge_type, connection_type, raw_document, document,
                connection, list_field, paginate, node, page_size, mode, embedded, target_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '', ?9, ?10, ?11, ?12, ?13)
            "#,
        )?
        .execute(params![
            name,
            node_type,
            edge_type,
            connection_type,
            field.raw_document,
            field.document,
            connection,
            field.selection,
            node,
            page_size,
            mode.as_str(),
            field.embedded,
            parent_type
        ])?;
        discovered += 1;

        if !name.is_empty() {
            names.entry(name).or_default().push(field.location.clone());
        }
    }

    for (name, locations) in names {
        if locations.len() > 1 {
            let mut diagnostic = Diagnostic::new(
                ErrorKind::Validation,
                format!("List names must be unique; {} is used {} times", name, locations.len()),
            );
            for location in locations {
                diagnostic = diagnostic.at(location);
            }
            diagnostics.push(diagnostic);
        }
    }

    info!("Discovered {} lists", discovered);
    Ok(diagnostics)
}

/// Every discovered list, in discovery order
pub fn discovered_lists(conn: &Connection) -> Result<Vec<DiscoveredList>> {
    ir::query_all(
        conn,
        r#"
        SELECT id, name, node_type, edge_type, connection_type, raw_document, document,
               connection, list_field, paginate, node, page_size, mode, embedded, target_type,
               supports_forward, supports_backward, cursor_type
        FROM discovered_lists ORDER BY id
        "#,
        [],
        row_to_list,
    )
}

fn row_to_list(row: &Row<'_>) -> rusqlite::Result<DiscoveredList> {
    Ok(DiscoveredList {
        id: row.get(0)?,
        name: row.get(1)?,
        node_type: row.get(2)?,
        edge_type: row.get(3)?,
        connection_type: row.get(4)?,
        raw_document: row.get(5)?,
        document: row.get(6)?,
        connection: row.get(7)?,
        list_field: row.get(8)?,
        paginate: PaginationDirection::from_str(&row.get::<_, String>(9)?),
        node: row.get(10)?,
        page_size: row.get(11)?,
        mode: ir::enum_column(row, 12, PaginateMode::from_str)?,
        embedded: row.get(13)?,
        target_type: row.get(14)?,
        supports_forward: row.get(15)?,
        supports_backward: row.get(16)?,
        cursor_type: row.get(17)?,
    })
}

fn tagged_selections(conn: &Connection) -> Result<Vec<Tagged>> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, r.document, d.raw_document, d.kind, s.field_name,
               tf.parent, tf.type, tf.type_modifiers, r.row, r.column
        FROM selection_directives sd
        JOIN selections s ON s.id = sd.selection_id
        JOIN selection_refs r ON r.child_id = s.id
        JOIN documents d ON d.id = r.document
        LEFT JOIN type_fields tf ON tf.id = s.type
        WHERE sd.directive IN (?1, ?2) AND s.kind = 'field'
        ORDER BY r.document, s.id
        "#,
        params![LIST_DIRECTIVE, PAGINATE_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
            ))
        },
    )?;

    let mut tagged = Vec::with_capacity(rows.len());
    for (selection, document, raw_document, kind, field_name, parent, ty, modifiers, row, column) in rows {
        tagged.push(Tagged {
            selection,
            document,
            raw_document,
            embedded: DocumentKind::from_str(&kind) == Some(DocumentKind::Fragment),
            field_name,
            parent_type: parent,
            return_type: ty.map(|name| TypeRef {
                name,
                modifiers: modifiers.unwrap_or_default(),
            }),
            location: ir::raw_location(conn, raw_document)?.at(row, column),
        });
    }
    Ok(tagged)
}

/// `(edge type, node type)` of a connection type
fn connection_shape(conn: &Connection, connection: &str) -> Result<Option<(String, String)>> {
    let Some(edges) = ir::type_field(conn, &format!("{}.edges", connection))? else {
        return Ok(None);
    };
    let Some(node) = ir::type_field(conn, &format!("{}.node", edges.name))? else {
        return Ok(None);
    };
    Ok(Some((edges.name, node.name)))
}

/// A field selected directly below `parent` in `document`
pub fn child_field(conn: &Connection, document: i64, parent: i64, name: &str) -> Result<Option<i64>> {
    Ok(ir::query_all(
        conn,
        r#"
        SELECT s.id FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        WHERE r.document = ?1 AND r.parent_id = ?2 AND s.kind = 'field' AND s.field_name = ?3
        ORDER BY r.path_index LIMIT 1
        "#,
        params![document, parent, name],
        |row| row.get(0),
    )?
    .into_iter()
    .next())
}

/// Page size from a literal `first`/`last`/`limit` or a variable default
fn page_size(conn: &Connection, document: i64, selection: i64) -> Result<Option<i64>> {
    let arguments = ir::selection_arguments(conn, selection)?;
    for name in PAGE_SIZE_ARGS {
        let Some((_, value)) = arguments.iter().find(|(arg, _)| arg == name) else {
            continue;
        };
        match value.kind {
            ValueKind::Int => return Ok(value.raw.parse().ok()),
            ValueKind::Variable => {
                let variables = ir::document_variables(conn, document)?;
                let default = variables
                    .iter()
                    .find(|v| v.name == value.raw)
                    .and_then(|v| v.default_value);
                if let Some(default) = default {
                    let default = ir::load_value(conn, default)?;
                    if default.kind == ValueKind::Int {
                        return Ok(default.raw.parse().ok());
                    }
                }
                return Ok(None);
            }
            _ => return Ok(None),
        }
    }
    Ok(None)
}

fn argument_raw(arguments: &[(String, ArgumentValue)], name: &str) -> Option<String> {
    arguments
        .iter()
        .find(|(arg, _)| arg == name)
        .map(|(_, value)| value.raw.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{compile_until_discovered, SCHEMA};

    fn discover(documents: &[&str]) -> (Vec<DiscoveredList>, Diagnostics) {
        let (store, diagnostics) =
            compile_until_discovered(SCHEMA, documents, &ProjectConfig::default());
        let conn = store.connection().unwrap();
        (discovered_lists(&conn).unwrap(), diagnostics)
    }

    #[test]
    fn test_plain_list() {
        let (lists, diagnostics) =
            discover(&[r#"query Q { users @list(name: "All_Users") { firstName } }"#]);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        assert_eq!(lists.len(), 1);
        let list = &lists[0];
        assert_eq!(list.name, "All_Users");
        assert_eq!(list.node_type, "User");
        assert!(!list.connection);
        assert_eq!(list.node, list.list_field);
        assert_eq!(list.target_type, "Query");
        assert!(!list.embedded);
        assert_eq!(list.paginate, PaginationDirection::None);
    }

    #[test]
    fn test_connection_list() {
        let (lists, diagnostics) = discover(&[
            r#"query Q { userConnection(first: 10) @paginate(name: "Users") { edges { node { id } } } }"#,
        ]);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let list = &lists[0];
        assert!(list.connection);
        assert_eq!(list.node_type, "User");
        assert_eq!(list.edge_type.as_deref(), Some("UserEdge"));
        assert_eq!(list.connection_type.as_deref(), Some("UserConnection"));
        assert_ne!(list.node, list.list_field);
        assert_eq!(list.page_size, Some(10));
        assert_eq!(list.mode, PaginateMode::Infinite);
    }

    #[test]
    fn test_page_size_from_variable_default() {
        let (lists, _) = discover(&[
            r#"query Q($size: Int = 5) { users(limit: $size) @paginate(mode: SinglePage) { id } }"#,
        ]);
        assert_eq!(lists[0].page_size, Some(5));
        assert_eq!(lists[0].mode, PaginateMode::SinglePage);
        assert_eq!(lists[0].name, "");
    }

    #[test]
    fn test_embedded_list() {
        let (lists, _) = discover(&[
            r#"fragment Friends on User { friendsList @list(name: "Friends") { id } }"#,
        ]);
        assert!(lists[0].embedded);
        assert_eq!(lists[0].target_type, "User");
    }

    #[test]
    fn test_duplicate_names() {
        let (_, diagnostics) = discover(&[
            r#"query A { users @list(name: "Same") { id } }"#,
            r#"query B { users @list(name: "Same") { id } }"#,
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.as_slice()[0].locations.len(), 2);
    }

    #[test]
    fn test_invalid_shapes() {
        let (lists, diagnostics) = discover(&[
            r#"query A { user @list(name: "NotAList") { id } }"#,
            r#"query B { userConnection @list(name: "NoNode") { pageInfo { endCursor } } }"#,
        ]);
        assert!(lists.is_empty());
        assert_eq!(diagnostics.len(), 2);
    }
}
