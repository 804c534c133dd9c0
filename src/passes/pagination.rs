//! Pagination document preparation
//!
//! A paginated field reads its page arguments from document variables so
//! the runtime can fetch the next page by changing variables only. Literal
//! arguments become the variables' defaults.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::constants::{DEDUPE_DIRECTIVE, DEDUPE_MATCH_ARG};
use crate::db::ir::{self, TypeRef};
use crate::passes::lists::discovered_lists;
use crate::types::{DiscoveredList, PaginationDirection, ValueKind};

/// Materialize page variables on every paginated list's document
pub fn prepare_pagination(conn: &Connection, config: &ProjectConfig) -> Result<usize> {
    let lists: Vec<DiscoveredList> = discovered_lists(conn)?
        .into_iter()
        .filter(|list| list.paginate != PaginationDirection::None)
        .collect();

    for list in &lists {
        let (field_type, position) = list_field(conn, list)?;
        for (name, type_name) in page_arguments(list) {
            bind_page_argument(conn, list, field_type.as_deref(), position, name, &type_name)?;
        }

        let document = ir::get_document(conn, list.document)?;
        let is_operation = document.map(|d| d.kind.is_operation()).unwrap_or(false);
        if is_operation
            && !config.suppress_pagination_deduplication
            && !ir::document_has_directive(conn, list.document, DEDUPE_DIRECTIVE)?
        {
            let directive = ir::insert_document_directive(conn, list.document, DEDUPE_DIRECTIVE, position)?;
            let expected = TypeRef {
                name: "DedupeMatchMode".to_string(),
                modifiers: String::new(),
            };
            let value = ir::insert_argument_value(
                conn,
                ValueKind::Enum,
                "Variables",
                Some(&expected),
                Some(list.document),
                position,
            )?;
            ir::insert_document_directive_argument(conn, directive, DEDUPE_MATCH_ARG, value, position)?;
        }
        debug!("Prepared pagination for list {} in document {}", list.id, list.document);
    }

    info!("Prepared {} paginated lists", lists.len());
    Ok(lists.len())
}

/// The variables a list pages with, and their types
fn page_arguments(list: &DiscoveredList) -> Vec<(&'static str, String)> {
    let cursor = list.cursor_type.clone().unwrap_or_else(|| "String".to_string());
    let mut arguments = Vec::new();
    if list.connection {
        if list.supports_forward {
            arguments.push(("first", "Int".to_string()));
            arguments.push(("after", cursor.clone()));
        }
        if list.supports_backward {
            arguments.push(("last", "Int".to_string()));
            arguments.push(("before", cursor));
        }
    } else {
        arguments.push(("limit", "Int".to_string()));
        arguments.push(("offset", "Int".to_string()));
    }
    arguments
}

/// Schema field id of the list field and where it sits in its document
fn list_field(conn: &Connection, list: &DiscoveredList) -> Result<(Option<String>, (i64, i64))> {
    let field_type: Option<String> = conn
        .prepare_cached("SELECT type FROM selections WHERE id = ?1")?
        .query_row(params![list.list_field], |row| row.get(0))
        .optional()?
        .flatten();
    let position = conn
        .prepare_cached(
            "SELECT row, column FROM selection_refs WHERE child_id = ?1 AND document = ?2 ORDER BY id LIMIT 1",
        )?
        .query_row(params![list.list_field, list.document], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })
        .optional()?
        .unwrap_or((0, 0));
    Ok((field_type, position))
}

fn bind_page_argument(
    conn: &Connection,
    list: &DiscoveredList,
    field_type: Option<&str>,
    position: (i64, i64),
    name: &str,
    type_name: &str,
) -> Result<()> {
    let existing: Option<(i64, i64, String)> = conn
        .prepare_cached(
            r#"
            SELECT a.id, a.value, v.kind FROM selection_arguments a
            JOIN argument_values v ON v.id = a.value
            WHERE a.selection_id = ?1 AND a.name = ?2
            "#,
        )?
        .query_row(params![list.list_field, name], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()?;

    let default_value = match existing {
        // Already driven by a variable
        Some((_, _, kind)) if kind == ValueKind::Variable.as_str() => return Ok(()),
        Some((argument, value, _)) => {
            conn.prepare_cached("DELETE FROM selection_arguments WHERE id = ?1")?
                .execute(params![argument])?;
            Some(value)
        }
        None => None,
    };

    let expected = TypeRef {
        name: type_name.to_string(),
        modifiers: String::new(),
    };
    let variable = ir::insert_argument_value(
        conn,
        ValueKind::Variable,
        name,
        Some(&expected),
        Some(list.document),
        position,
    )?;
    let field_argument = field_type.map(|field| format!("{}.{}", field, name));
    ir::insert_selection_argument(
        conn,
        list.list_field,
        name,
        variable,
        field_argument.as_deref(),
        position,
    )?;

    let declared = ir::document_variables(conn, list.document)?
        .into_iter()
        .find(|v| v.name == name);
    match declared {
        None => {
            ir::insert_document_variable(conn, list.document, name, &expected, default_value, position)?;
        }
        // A declared default wins over the literal
        Some(variable) if variable.default_value.is_none() && default_value.is_some() => {
            conn.prepare_cached("UPDATE document_variables SET default_value = ?1 WHERE id = ?2")?
                .execute(params![default_value, variable.id])?;
        }
        Some(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_document;
    use crate::testing::{compile_until_discovered, SCHEMA};
    use crate::types::DocumentKind;
    use crate::validate::lists::validate_paginate_args;

    fn prepare(document: &str, config: &ProjectConfig) -> String {
        let (store, diagnostics) = compile_until_discovered(SCHEMA, &[document], config);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let conn = store.connection().unwrap();
        let diagnostics = validate_paginate_args(&conn, config).unwrap();
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        assert_eq!(prepare_pagination(&conn, config).unwrap(), 1);
        let query = ir::find_document(&conn, "Q", DocumentKind::Query).unwrap().unwrap();
        print_document(&conn, query.id).unwrap()
    }

    #[test]
    fn test_forward_connection() {
        let printed = prepare(
            "query Q { userConnection(first: 10) @paginate { edges { node { id } } } }",
            &ProjectConfig::default(),
        );
        assert!(
            printed.starts_with(
                "query Q($first: Int = 10, $after: String, $last: Int, $before: String) @dedupe(match: Variables) {"
            ),
            "{}",
            printed
        );
        assert!(printed.contains(
            "userConnection(first: $first, after: $after, last: $last, before: $before) @paginate {"
        ));
    }

    #[test]
    fn test_offset_list() {
        let printed = prepare(
            "query Q { users(limit: 10) @paginate { id } }",
            &ProjectConfig::default(),
        );
        assert!(printed.starts_with("query Q($limit: Int = 10, $offset: Int) @dedupe(match: Variables) {"));
        assert!(printed.contains("users(limit: $limit, offset: $offset) @paginate {"));
    }

    #[test]
    fn test_dedupe_can_be_suppressed() {
        let config = ProjectConfig {
            suppress_pagination_deduplication: true,
            ..Default::default()
        };
        let printed = prepare("query Q { users(limit: 10) @paginate { id } }", &config);
        assert!(!printed.contains("@dedupe"));
    }

    #[test]
    fn test_existing_variable_is_kept() {
        let printed = prepare(
            "query Q($size: Int = 3) { users(limit: $size) @paginate { id } }",
            &ProjectConfig::default(),
        );
        assert!(printed.contains("users(limit: $size, offset: $offset) @paginate"), "{}", printed);
        assert!(printed.starts_with("query Q($size: Int = 3, $offset: Int)"));
    }

    #[test]
    fn test_literal_becomes_default_of_declared_variable() {
        let printed = prepare(
            "query Q($limit: Int) { users(limit: 10) @paginate { id } }",
            &ProjectConfig::default(),
        );
        assert!(printed.starts_with("query Q($limit: Int = 10, $offset: Int)"), "{}", printed);
        assert!(printed.contains("users(limit: $limit, offset: $offset) @paginate"));

        let printed = prepare(
            "query Q($limit: Int = 5) { users(limit: 10) @paginate { id } }",
            &ProjectConfig::default(),
        );
        assert!(printed.starts_with("query Q($limit: Int = 5, $offset: Int)"), "{}", printed);
    }
}
