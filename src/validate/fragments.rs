//! Fragment rules: unknown spreads, `@with` arguments and duplicate names

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{params, Connection};

use super::location;
use crate::config::ProjectConfig;
use crate::constants::{LIST_OPERATION_SUFFIXES, WITH_DIRECTIVE};
use crate::db::ir::{self, VariableRow};
use crate::diagnostics::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::types::DocumentKind;
use crate::values::check_value;

/// A fragment spread as placed in a document
struct Spread {
    selection: i64,
    fragment: String,
    location: Location,
}

fn spreads(conn: &Connection) -> Result<Vec<Spread>> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, s.field_name, d.raw_document, r.row, r.column
        FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        JOIN documents d ON d.id = r.document
        WHERE s.kind = 'fragment'
        ORDER BY r.document, s.id
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
    let mut spreads = Vec::with_capacity(rows.len());
    for (selection, fragment, raw, row, column) in rows {
        spreads.push(Spread {
            selection,
            fragment,
            location: location(conn, raw, row, column)?,
        });
    }
    Ok(spreads)
}

/// Arguments of a spread's `@with`: name, value id and location. `None`
/// when the spread has no `@with`.
fn with_arguments(conn: &Connection, selection: i64) -> Result<Option<Vec<(String, i64, Location)>>> {
    let directives = ir::query_all(
        conn,
        "SELECT id FROM selection_directives WHERE selection_id = ?1 AND directive = ?2 ORDER BY id",
        params![selection, WITH_DIRECTIVE],
        |row| row.get::<_, i64>(0),
    )?;
    if directives.is_empty() {
        return Ok(None);
    }

    let mut arguments = Vec::new();
    for directive in directives {
        let rows = ir::query_all(
            conn,
            r#"
            SELECT a.name, a.value, a.row, a.column, d.raw_document
            FROM selection_directive_arguments a
            JOIN selection_directives sd ON sd.id = a.parent
            JOIN selection_refs r ON r.child_id = sd.selection_id
            JOIN documents d ON d.id = r.document
            WHERE a.parent = ?1
            GROUP BY a.id
            ORDER BY a.id
            "#,
            params![directive],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )?;
        for (name, value, row, column, raw) in rows {
            arguments.push((name, value, location(conn, raw, row, column)?));
        }
    }
    Ok(Some(arguments))
}

fn is_required(variable: &VariableRow) -> bool {
    variable.modifiers.ends_with('!') && variable.default_value.is_none()
}

/// Spreads of fragments that don't exist
///
/// The operation fragments of named lists are generated later and count as
/// known.
pub fn validate_unknown_fragments(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let generated: Vec<String> = ir::query_all(
        conn,
        "SELECT name FROM discovered_lists WHERE name != ''",
        [],
        |row| row.get::<_, String>(0),
    )?
    .into_iter()
    .flat_map(|name| LIST_OPERATION_SUFFIXES.iter().map(move |suffix| format!("{}{}", name, suffix)))
    .collect();

    let mut diagnostics = Diagnostics::new();
    for spread in spreads(conn)? {
        if generated.contains(&spread.fragment)
            || ir::find_document(conn, &spread.fragment, DocumentKind::Fragment)?.is_some()
        {
            continue;
        }
        diagnostics.push(Diagnostic::validation(
            format!("Unknown fragment \"{}\"", spread.fragment),
            spread.location,
        ));
    }
    Ok(diagnostics)
}

/// Spreads of fragments with required arguments must pass them
pub fn validate_fragment_arguments_missing_with(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for spread in spreads(conn)? {
        let Some(fragment) = ir::find_document(conn, &spread.fragment, DocumentKind::Fragment)? else {
            continue;
        };
        let required = ir::document_variables(conn, fragment.id)?
            .iter()
            .any(is_required);
        if !required {
            continue;
        }
        let passed = with_arguments(conn, spread.selection)?.unwrap_or_default();
        if passed.is_empty() {
            diagnostics.push(Diagnostic::validation(
                format!(
                    "{} has required arguments; pass them with @{}",
                    spread.fragment, WITH_DIRECTIVE
                ),
                spread.location,
            ));
        }
    }
    Ok(diagnostics)
}

/// `@with` arguments must be declared, fit their type and cover every
/// required argument
pub fn validate_fragment_argument_values(
    conn: &Connection,
    _config: &ProjectConfig,
) -> Result<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    for spread in spreads(conn)? {
        let Some(arguments) = with_arguments(conn, spread.selection)? else {
            continue;
        };
        let Some(fragment) = ir::find_document(conn, &spread.fragment, DocumentKind::Fragment)? else {
            continue;
        };
        let declared = ir::document_variables(conn, fragment.id)?;

        for (name, value, location) in &arguments {
            let Some(variable) = declared.iter().find(|v| &v.name == name) else {
                diagnostics.push(Diagnostic::validation(
                    format!("{} has no argument named {}", spread.fragment, name),
                    location.clone(),
                ));
                continue;
            };
            let value = ir::load_value(conn, *value)?;
            if let Err(reason) = check_value(&value, &variable.modifiers) {
                diagnostics.push(Diagnostic::validation(
                    format!("Invalid value for argument {} of {}: {}", name, spread.fragment, reason),
                    location.clone(),
                ));
            }
        }

        for variable in declared.iter().filter(|v| is_required(v)) {
            if !arguments.iter().any(|(name, _, _)| name == &variable.name) {
                diagnostics.push(Diagnostic::validation(
                    format!(
                        "Missing required argument {} of {}",
                        variable.name, spread.fragment
                    ),
                    spread.location.clone(),
                ));
            }
        }
    }
    Ok(diagnostics)
}

/// Document names are unique within a kind
pub fn validate_duplicate_documents(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        "SELECT name, kind, raw_document, row, column FROM documents WHERE name != '' ORDER BY id",
        [],
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

    let mut by_name: BTreeMap<(String, String), Vec<Location>> = BTreeMap::new();
    for (name, kind, raw, row, column) in rows {
        by_name
            .entry((kind, name))
            .or_default()
            .push(location(conn, raw, row, column)?);
    }

    let mut diagnostics = Diagnostics::new();
    for ((kind, name), locations) in by_name {
        if locations.len() < 2 {
            continue;
        }
        let mut diagnostic = Diagnostic::new(
            ErrorKind::Validation,
            format!("There are {} {} documents named {}", locations.len(), kind, name),
        );
        for location in locations {
            diagnostic = diagnostic.at(location);
        }
        diagnostics.push(diagnostic);
    }
    Ok(diagnostics)
}
