//! List and pagination rules

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{params, Connection};

use super::{location, under_list};
use crate::config::ProjectConfig;
use crate::constants::{
    ALL_LISTS_DIRECTIVE, LIST_DIRECTIVE, LIST_OPERATION_SUFFIXES, PAGINATE_DIRECTIVE,
    PARENT_ID_DIRECTIVE,
};
use crate::db::ir;
use crate::diagnostics::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::passes::lists::discovered_lists;
use crate::types::{DiscoveredList, ListTarget, PaginateMode, PaginationDirection};

/// Where a list's field sits in its document
fn list_location(conn: &Connection, list: &DiscoveredList) -> Result<Location> {
    let (row, column) = ir::query_all(
        conn,
        "SELECT row, column FROM selection_refs WHERE child_id = ?1 AND document = ?2 ORDER BY id LIMIT 1",
        params![list.list_field, list.document],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?
    .into_iter()
    .next()
    .unwrap_or((0, 0));
    location(conn, list.raw_document, row, column)
}

fn has_directive(conn: &Connection, selection: i64, directive: &str) -> Result<bool> {
    Ok(!ir::query_all(
        conn,
        "SELECT 1 FROM selection_directives WHERE selection_id = ?1 AND directive = ?2 LIMIT 1",
        params![selection, directive],
        |row| row.get::<_, i64>(0),
    )?
    .is_empty())
}

/// Check how every `@paginate` field pages and record it on the list
///
/// A connection pages forward with `first`/`after` and backward with
/// `last`/`before`; a plain list pages with `limit`/`offset`.
pub fn validate_paginate_args(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for list in discovered_lists(conn)? {
        if !has_directive(conn, list.list_field, PAGINATE_DIRECTIVE)? {
            continue;
        }
        let location = list_location(conn, &list)?;

        // Arguments the schema field declares, with their types
        let declared: BTreeMap<String, String> = ir::query_all(
            conn,
            r#"
            SELECT a.name, a.type FROM selections s
            JOIN type_field_arguments a ON a.field = s.type
            WHERE s.id = ?1
            "#,
            params![list.list_field],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .into_iter()
        .collect();
        let applied: Vec<String> = ir::selection_arguments(conn, list.list_field)?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        let is_applied = |name: &str| applied.iter().any(|a| a == name);

        if under_list(conn, list.list_field, list.document)? {
            diagnostics.push(Diagnostic::validation(
                "@paginate can't be used inside a list",
                location.clone(),
            ));
            continue;
        }

        let mut supports_forward = false;
        let mut supports_backward = false;
        let mut cursor_type = None;
        let direction = if list.connection {
            supports_forward = declared.contains_key("first") && declared.contains_key("after");
            supports_backward = declared.contains_key("last") && declared.contains_key("before");
            cursor_type = declared
                .get("after")
                .or_else(|| declared.get("before"))
                .cloned();

            if !supports_forward && !supports_backward {
                diagnostics.push(Diagnostic::validation(
                    "A paginated connection must accept first/after or last/before",
                    location,
                ));
                continue;
            }
            let first = is_applied("first");
            let last = is_applied("last");
            if first && last && list.mode != PaginateMode::SinglePage {
                diagnostics.push(Diagnostic::validation(
                    "A paginated field can't pass both first and last",
                    location,
                ));
                continue;
            }
            if first {
                PaginationDirection::Forward
            } else if last {
                PaginationDirection::Backward
            } else {
                diagnostics.push(Diagnostic::validation(
                    "A paginated connection must pass first or last",
                    location,
                ));
                continue;
            }
        } else {
            if !declared.contains_key("limit") || !declared.contains_key("offset") {
                diagnostics.push(Diagnostic::validation(
                    "A paginated list must accept limit and offset",
                    location,
                ));
                continue;
            }
            if !is_applied("limit") {
                diagnostics.push(Diagnostic::validation(
                    "A paginated list must pass limit",
                    location,
                ));
                continue;
            }
            supports_forward = true;
            PaginationDirection::Forward
        };

        conn.prepare_cached(
            r#"
            UPDATE discovered_lists
            SET paginate = ?1, supports_forward = ?2, supports_backward = ?3, cursor_type = ?4
            WHERE id = ?5
            "#,
        )?
        .execute(params![
            direction.as_str(),
            supports_forward,
            supports_backward,
            cursor_type,
            list.id
        ])?;
    }
    Ok(diagnostics)
}

/// One `@paginate` per document
pub fn validate_single_paginate(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT r.document, d.raw_document, sd.row, sd.column
        FROM selection_directives sd
        JOIN selection_refs r ON r.child_id = sd.selection_id
        JOIN documents d ON d.id = r.document
        WHERE sd.directive = ?1
        ORDER BY r.document, sd.id
        "#,
        params![PAGINATE_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;

    let mut by_document: BTreeMap<i64, Vec<Location>> = BTreeMap::new();
    for (document, raw, row, column) in rows {
        by_document
            .entry(document)
            .or_default()
            .push(location(conn, raw, row, column)?);
    }

    let mut diagnostics = Diagnostics::new();
    for locations in by_document.into_values() {
        if locations.len() > 1 {
            let mut diagnostic = Diagnostic::new(
                ErrorKind::Validation,
                "A document can only contain one @paginate",
            );
            for location in locations {
                diagnostic = diagnostic.at(location);
            }
            diagnostics.push(diagnostic);
        }
    }
    Ok(diagnostics)
}

/// A paginated fragment must be refetchable on its own
///
/// Its type condition implements `Node`, has a configured resolve query, or
/// is the query root. A fragment on the root refetches through the root.
pub fn validate_paginate_type_condition(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT d.type_condition, d.raw_document, d.row, d.column
        FROM documents d
        JOIN selection_refs r ON r.document = d.id
        JOIN selection_directives sd ON sd.selection_id = r.child_id
        WHERE d.kind = 'fragment' AND sd.directive = ?1
          AND NOT EXISTS (
              SELECT 1 FROM possible_types p WHERE p.type = 'Node' AND p.member = d.type_condition
          )
          AND NOT EXISTS (
              SELECT 1 FROM type_configs c
              WHERE c.name = d.type_condition AND COALESCE(c.resolve_query, '') != ''
          )
          AND NOT EXISTS (
              SELECT 1 FROM types t WHERE t.name = d.type_condition AND t.operation = 'query'
          )
        "#,
        params![PAGINATE_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;

    let mut diagnostics = Diagnostics::new();
    for (type_condition, raw, row, column) in rows {
        diagnostics.push(Diagnostic::validation(
            format!(
                "A paginated fragment must be on a type that implements Node or has a resolve query, not {}",
                type_condition.unwrap_or_default()
            ),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

/// Operation fragments of nested or embedded lists must say which list
/// they target
pub fn validate_parent_id(conn: &Connection, config: &ProjectConfig) -> Result<Diagnostics> {
    if config.default_list_target == ListTarget::All {
        return Ok(Diagnostics::new());
    }

    let mut ambiguous: BTreeMap<String, bool> = BTreeMap::new();
    for list in discovered_lists(conn)? {
        if list.name.is_empty() {
            continue;
        }
        let needs_parent = list.embedded || under_list(conn, list.list_field, list.document)?;
        *ambiguous.entry(list.name).or_default() |= needs_parent;
    }

    let spreads = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, s.field_name, d.raw_document, r.row, r.column
        FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        JOIN documents d ON d.id = r.document
        WHERE s.kind = 'fragment'
        ORDER BY s.id
        "#,
        [],
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

    let mut diagnostics = Diagnostics::new();
    for (selection, fragment, raw, row, column) in spreads {
        let Some(list) = LIST_OPERATION_SUFFIXES
            .iter()
            .find_map(|suffix| fragment.strip_suffix(suffix))
        else {
            continue;
        };
        if !ambiguous.get(list).copied().unwrap_or(false) {
            continue;
        }
        if has_directive(conn, selection, PARENT_ID_DIRECTIVE)?
            || has_directive(conn, selection, ALL_LISTS_DIRECTIVE)?
        {
            continue;
        }
        diagnostics.push(Diagnostic::validation(
            format!(
                "{} targets a nested list; add @{} or @{}",
                fragment, PARENT_ID_DIRECTIVE, ALL_LISTS_DIRECTIVE
            ),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

/// `@list` and `@paginate` can't share a field
pub fn validate_conflicting_paginate_list(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, d.raw_document, r.row, r.column
        FROM selections s
        JOIN selection_refs r ON r.child_id = s.id
        JOIN documents d ON d.id = r.document
        WHERE EXISTS (SELECT 1 FROM selection_directives a WHERE a.selection_id = s.id AND a.directive = ?1)
          AND EXISTS (SELECT 1 FROM selection_directives b WHERE b.selection_id = s.id AND b.directive = ?2)
        ORDER BY s.id
        "#,
        params![LIST_DIRECTIVE, PAGINATE_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;

    let mut diagnostics = Diagnostics::new();
    for (_, raw, row, column) in rows {
        diagnostics.push(Diagnostic::validation(
            format!("@{} and @{} can't be used on the same field", LIST_DIRECTIVE, PAGINATE_DIRECTIVE),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}
