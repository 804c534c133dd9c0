//! Fragment argument inlining
//!
//! A fragment that declares `@arguments` is a template. Every spread of it
//! is pointed at a clone named `<Fragment>_<hash>`, where the hash covers
//! the arguments the spread applies, and the clone's variables are replaced
//! by those values (or the declared defaults). Clones are processed in turn
//! so spreads nested inside them are resolved with the clone's scope.
//!
//! Templates themselves are never modified.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{ARGUMENTS_DIRECTIVE, WITH_DIRECTIVE};
use crate::db::ir::{self, DocumentRow};
use crate::db::{self, Store};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::hash::arguments_hash;
use crate::types::{DocumentKind, SelectionKind, ValueKind};
use crate::worker::WorkQueue;

/// Variable name to the value it is replaced with
type Scope = HashMap<String, i64>;

struct Task {
    document: i64,
    scope: Scope,
}

/// Result of an inliner run
#[derive(Debug, Default)]
pub struct InlineOutput {
    pub clones: usize,
    pub diagnostics: Diagnostics,
}

/// State a worker keeps across the documents it processes
struct WorkerState {
    /// Shared `null` used when a variable has neither value nor default
    null_value: Option<i64>,
    clones: usize,
    diagnostics: Diagnostics,
}

/// Inline fragment arguments across every document reachable from a root
pub fn inline_fragment_arguments(
    store: &Store,
    width: usize,
    cancel: &CancellationToken,
) -> Result<InlineOutput> {
    let roots = {
        let conn = store.connection()?;
        root_documents(&conn)?
    };
    info!("Inlining fragment arguments from {} roots", roots.len());

    let width = width.max(1);
    let queue = WorkQueue::new(width * 2, cancel.clone());
    let processed: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let mut output = InlineOutput::default();

    std::thread::scope(|s| -> Result<()> {
        let mut workers = Vec::with_capacity(width);
        for _ in 0..width {
            let queue = &queue;
            let processed = &processed;
            workers.push(s.spawn(move || {
                let mut state = WorkerState {
                    null_value: None,
                    clones: 0,
                    diagnostics: Diagnostics::new(),
                };
                while let Some(task) = queue.pop() {
                    let null_value = state.null_value;
                    let result = store.connection().and_then(|mut conn| {
                        db::transaction(&mut conn, |tx| {
                            let mut null_value = null_value;
                            let follow_ups = process_document(tx, &task, processed, &mut null_value)?;
                            Ok((follow_ups, null_value))
                        })
                    });
                    match result {
                        Ok((follow_ups, null_value)) => {
                            state.null_value = null_value;
                            state.clones += follow_ups.len();
                            for follow_up in follow_ups {
                                queue.push_follow_up(follow_up);
                            }
                        }
                        Err(err) => {
                            // The null value was rolled back with the rest
                            state.null_value = None;
                            warn!("Failed to inline arguments in document {}: {:#}", task.document, err);
                            state.diagnostics.push(Diagnostic::internal(format!(
                                "failed to inline fragment arguments in document {}: {:#}",
                                task.document, err
                            )));
                        }
                    }
                }
                state
            }));
        }

        for document in roots {
            let task = Task {
                document,
                scope: Scope::new(),
            };
            if !queue.push(task) {
                break;
            }
        }
        queue.close();

        let mut panicked = 0;
        for worker in workers {
            match worker.join() {
                Ok(state) => {
                    output.clones += state.clones;
                    output.diagnostics.extend(state.diagnostics);
                }
                Err(_) => panicked += 1,
            }
        }
        if panicked > 0 {
            bail!("{} inliner workers panicked", panicked);
        }
        Ok(())
    })?;

    info!("Created {} fragment clones", output.clones);
    Ok(output)
}

/// Operations, and fragments that declare no arguments
fn root_documents(conn: &Connection) -> Result<Vec<i64>> {
    ir::query_all(
        conn,
        r#"
        SELECT d.id FROM documents d
        WHERE d.kind != 'fragment'
           OR NOT EXISTS (SELECT 1 FROM document_variables v WHERE v.document = d.id)
        ORDER BY d.id
        "#,
        [],
        |row| row.get(0),
    )
}

/// Substitute the scope into a document, then clone the targets of its
/// spreads. Returns the clones still to be processed.
fn process_document(
    conn: &Connection,
    task: &Task,
    processed: &Mutex<HashSet<String>>,
    null_value: &mut Option<i64>,
) -> Result<Vec<Task>> {
    let document = ir::get_document(conn, task.document)?
        .ok_or_else(|| anyhow!("document {} does not exist", task.document))?;
    if !task.scope.is_empty() {
        substitute_variables(conn, document.id, &task.scope)?;
    }

    let mut follow_ups = Vec::new();
    for (spread, target_name) in spreads(conn, document.id)? {
        let Some(target) = ir::find_document(conn, &target_name, DocumentKind::Fragment)? else {
            continue;
        };
        let declared = ir::document_variables(conn, target.id)?;
        if declared.is_empty() {
            continue;
        }

        let applied = applied_arguments(conn, &document, spread, &task.scope)?;
        let mut identity = BTreeMap::new();
        for (name, value) in &applied {
            identity.insert(name.clone(), value_raw(conn, *value)?);
        }
        let clone_name = format!("{}_{}", target.name, arguments_hash(&identity)?);

        conn.prepare_cached("UPDATE selections SET field_name = ?1 WHERE id = ?2")?
            .execute(params![clone_name, spread])?;

        if !processed.lock().insert(clone_name.clone()) {
            continue;
        }

        let clone = clone_fragment(conn, &target, &clone_name)?;
        let mut scope = Scope::new();
        for variable in declared {
            let value = match applied.get(&variable.name).copied().or(variable.default_value) {
                Some(value) => value,
                None => null(conn, null_value)?,
            };
            scope.insert(variable.name, value);
        }
        debug!("Cloned {} as {}", target.name, clone_name);
        follow_ups.push(Task {
            document: clone,
            scope,
        });
    }
    Ok(follow_ups)
}

/// Fragment spreads placed in a document
fn spreads(conn: &Connection, document: i64) -> Result<Vec<(i64, String)>> {
    ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, s.field_name FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        WHERE r.document = ?1 AND s.kind = ?2
        ORDER BY s.id
        "#,
        params![document, SelectionKind::Fragment.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// Values a spread passes through `@with`, with variables resolved
fn applied_arguments(
    conn: &Connection,
    document: &DocumentRow,
    spread: i64,
    scope: &Scope,
) -> Result<BTreeMap<String, i64>> {
    let arguments = ir::query_all(
        conn,
        r#"
        SELECT a.name, v.id, v.kind, v.raw FROM selection_directives d
        JOIN selection_directive_arguments a ON a.parent = d.id
        JOIN argument_values v ON v.id = a.value
        WHERE d.selection_id = ?1 AND d.directive = ?2
        ORDER BY a.id
        "#,
        params![spread, WITH_DIRECTIVE],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    )?;

    let defaults: HashMap<String, i64> = if document.kind == DocumentKind::Fragment {
        ir::document_variables(conn, document.id)?
            .into_iter()
            .filter_map(|v| v.default_value.map(|d| (v.name, d)))
            .collect()
    } else {
        HashMap::new()
    };

    let mut applied = BTreeMap::new();
    for (name, value, kind, raw) in arguments {
        let resolved = if kind == ValueKind::Variable.as_str() {
            scope
                .get(&raw)
                .or_else(|| defaults.get(&raw))
                .copied()
                .unwrap_or(value)
        } else {
            value
        };
        applied.insert(name, resolved);
    }
    Ok(applied)
}

fn value_raw(conn: &Connection, value: i64) -> Result<String> {
    conn.prepare_cached("SELECT raw FROM argument_values WHERE id = ?1")?
        .query_row(params![value], |row| row.get(0))
        .optional()?
        .ok_or_else(|| anyhow!("argument value {} does not exist", value))
}

fn null(conn: &Connection, null_value: &mut Option<i64>) -> Result<i64> {
    if let Some(id) = *null_value {
        return Ok(id);
    }
    let id = ir::insert_argument_value(conn, ValueKind::Null, "null", None, None, (0, 0))?;
    *null_value = Some(id);
    Ok(id)
}

/// Copy a template fragment under a new name
///
/// Values are copied through an id map. Selections that carry arguments or
/// directives, and spreads, get fresh rows since the clone rewrites them;
/// everything else is shared and only placed again.
fn clone_fragment(conn: &Connection, source: &DocumentRow, name: &str) -> Result<i64> {
    let position: (i64, i64) = conn
        .prepare_cached("SELECT row, column FROM documents WHERE id = ?1")?
        .query_row(params![source.id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let clone = ir::insert_document(
        conn,
        name,
        source.raw_document,
        DocumentKind::Fragment,
        source.type_condition.as_deref(),
        position,
    )?;

    let values = copy_values(conn, source.id, clone)?;
    let map_value = |id: i64| values.get(&id).copied().unwrap_or(id);

    // Document directives, except the argument declarations
    let directives = ir::query_all(
        conn,
        "SELECT id, directive, row, column FROM document_directives WHERE document = ?1 AND directive != ?2 ORDER BY id",
        params![source.id, ARGUMENTS_DIRECTIVE],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?)),
    )?;
    for (id, directive, row, column) in directives {
        let copy = ir::insert_document_directive(conn, clone, &directive, (row, column))?;
        let arguments = ir::query_all(
            conn,
            "SELECT name, value, row, column FROM document_directive_arguments WHERE parent = ?1 ORDER BY id",
            params![id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?, r.get::<_, i64>(3)?)),
        )?;
        for (arg, value, row, column) in arguments {
            ir::insert_document_directive_argument(conn, copy, &arg, map_value(value), (row, column))?;
        }
    }

    // Selections the clone will rewrite
    let owned = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT s.id, s.field_name, s.alias, s.kind, s.type FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        WHERE r.document = ?1 AND (
            s.kind = 'fragment'
            OR EXISTS (SELECT 1 FROM selection_arguments a WHERE a.selection_id = s.id)
            OR EXISTS (SELECT 1 FROM selection_directives d WHERE d.selection_id = s.id)
        )
        ORDER BY s.id
        "#,
        params![source.id],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                ir::enum_column(row, 3, SelectionKind::from_str)?,
                row.get::<_, Option<String>>(4)?,
            ))
        },
    )?;
    let mut selections: HashMap<i64, i64> = HashMap::new();
    for (id, field_name, alias, kind, type_id) in owned {
        let copy = ir::insert_selection(conn, &field_name, alias.as_deref(), kind, type_id.as_deref())?;
        copy_selection_arguments(conn, id, copy, &map_value)?;
        copy_selection_directives(conn, id, copy, &map_value)?;
        selections.insert(id, copy);
    }
    let map_selection = |id: i64| selections.get(&id).copied().unwrap_or(id);

    let refs = ir::query_all(
        conn,
        "SELECT parent_id, child_id, path_index, row, column FROM selection_refs WHERE document = ?1 ORDER BY id",
        params![source.id],
        |row| {
            Ok((
                row.get::<_, Option<i64>>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;
    for (parent, child, path_index, row, column) in refs {
        ir::insert_selection_ref(
            conn,
            parent.map(map_selection),
            map_selection(child),
            clone,
            path_index,
            (row, column),
        )?;
    }

    Ok(clone)
}

/// Copy every value owned by `source` into `target`, returning old -> new ids
fn copy_values(conn: &Connection, source: i64, target: i64) -> Result<HashMap<i64, i64>> {
    let values = ir::query_all(
        conn,
        r#"
        SELECT id, kind, raw, expected_type, expected_type_modifiers, row, column
        FROM argument_values WHERE document = ?1 ORDER BY id
        "#,
        params![source],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        },
    )?;

    let mut map = HashMap::with_capacity(values.len());
    for (id, kind, raw, expected_type, expected_modifiers, row, column) in values {
        conn.prepare_cached(
            r#"
            INSERT INTO argument_values (kind, raw, expected_type, expected_type_modifiers, document, row, column)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?
        .execute(params![kind, raw, expected_type, expected_modifiers, target, row, column])?;
        map.insert(id, conn.last_insert_rowid());
    }

    let children = ir::query_all(
        conn,
        r#"
        SELECT c.parent, c.value, c.name, c.row, c.column FROM argument_value_children c
        JOIN argument_values v ON v.id = c.parent
        WHERE v.document = ?1 ORDER BY c.id
        "#,
        params![source],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;
    for (parent, value, name, row, column) in children {
        let parent = map.get(&parent).copied().unwrap_or(parent);
        let value = map.get(&value).copied().unwrap_or(value);
        ir::insert_value_child(conn, parent, value, name.as_deref(), (row, column))?;
    }
    Ok(map)
}

fn copy_selection_arguments(
    conn: &Connection,
    from: i64,
    to: i64,
    map_value: &impl Fn(i64) -> i64,
) -> Result<()> {
    let arguments = ir::query_all(
        conn,
        r#"
        SELECT name, value, field_argument, row, column FROM selection_arguments
        WHERE selection_id = ?1 ORDER BY id
        "#,
        params![from],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;
    for (name, value, field_argument, row, column) in arguments {
        ir::insert_selection_argument(
            conn,
            to,
            &name,
            map_value(value),
            field_argument.as_deref(),
            (row, column),
        )?;
    }
    Ok(())
}

fn copy_selection_directives(
    conn: &Connection,
    from: i64,
    to: i64,
    map_value: &impl Fn(i64) -> i64,
) -> Result<()> {
    let directives = ir::query_all(
        conn,
        "SELECT id, directive, row, column FROM selection_directives WHERE selection_id = ?1 ORDER BY id",
        params![from],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?)),
    )?;
    for (id, directive, row, column) in directives {
        let copy = ir::insert_selection_directive(conn, to, &directive, (row, column))?;
        let arguments = ir::query_all(
            conn,
            "SELECT name, value, row, column FROM selection_directive_arguments WHERE parent = ?1 ORDER BY id",
            params![id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?, r.get::<_, i64>(3)?)),
        )?;
        for (name, value, row, column) in arguments {
            ir::insert_selection_directive_argument(conn, copy, &name, map_value(value), (row, column))?;
        }
    }
    Ok(())
}

/// Replace variables bound in `scope` by copies of their values
///
/// Nested values are handled first so a substituted value is never walked.
fn substitute_variables(conn: &Connection, document: i64, scope: &Scope) -> Result<()> {
    let nested = ir::query_all(
        conn,
        r#"
        WITH RECURSIVE tree(id) AS (
            SELECT a.value FROM selection_arguments a
            JOIN selection_refs r ON r.child_id = a.selection_id
            WHERE r.document = ?1
            UNION
            SELECT c.value FROM argument_value_children c
            JOIN tree ON c.parent = tree.id
        )
        SELECT DISTINCT c.id, v.id, v.raw FROM argument_value_children c
        JOIN tree ON c.parent = tree.id
        JOIN argument_values v ON v.id = c.value
        WHERE v.kind = 'Variable'
        "#,
        params![document],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
    )?;
    for (child, variable, name) in nested {
        if let Some(value) = scope.get(&name) {
            let copy = copy_value_into(conn, *value, variable, document)?;
            conn.prepare_cached("UPDATE argument_value_children SET value = ?1 WHERE id = ?2")?
                .execute(params![copy, child])?;
            delete_value(conn, variable)?;
        }
    }

    let direct = ir::query_all(
        conn,
        r#"
        SELECT DISTINCT a.id, v.id, v.raw FROM selection_arguments a
        JOIN selection_refs r ON r.child_id = a.selection_id
        JOIN argument_values v ON v.id = a.value
        WHERE r.document = ?1 AND v.kind = 'Variable'
        "#,
        params![document],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
    )?;
    for (argument, variable, name) in direct {
        if let Some(value) = scope.get(&name) {
            let copy = copy_value_into(conn, *value, variable, document)?;
            conn.prepare_cached("UPDATE selection_arguments SET value = ?1 WHERE id = ?2")?
                .execute(params![copy, argument])?;
            delete_value(conn, variable)?;
        }
    }
    Ok(())
}

/// Copy a value tree into `document`. The root takes the expected type and
/// position of the variable it replaces.
fn copy_value_into(conn: &Connection, value: i64, replaced: i64, document: i64) -> Result<i64> {
    let inserted = conn
        .prepare_cached(
            r#"
            INSERT INTO argument_values (kind, raw, expected_type, expected_type_modifiers, document, row, column)
            SELECT v.kind, v.raw, r.expected_type, r.expected_type_modifiers, ?3, r.row, r.column
            FROM argument_values v, argument_values r
            WHERE v.id = ?1 AND r.id = ?2
            "#,
        )?
        .execute(params![value, replaced, document])?;
    if inserted == 0 {
        return Err(anyhow!("argument value {} does not exist", value));
    }
    let root = conn.last_insert_rowid();
    copy_value_children(conn, value, root, document)?;
    Ok(root)
}

fn copy_value_children(conn: &Connection, from: i64, to: i64, document: i64) -> Result<()> {
    let children = ir::query_all(
        conn,
        "SELECT value, name, row, column FROM argument_value_children WHERE parent = ?1 ORDER BY id",
        params![from],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;
    for (child, name, row, column) in children {
        conn.prepare_cached(
            r#"
            INSERT INTO argument_values (kind, raw, expected_type, expected_type_modifiers, document, row, column)
            SELECT kind, raw, expected_type, expected_type_modifiers, ?2, row, column
            FROM argument_values WHERE id = ?1
            "#,
        )?
        .execute(params![child, document])?;
        let copy = conn.last_insert_rowid();
        ir::insert_value_child(conn, to, copy, name.as_deref(), (row, column))?;
        copy_value_children(conn, child, copy, document)?;
    }
    Ok(())
}

fn delete_value(conn: &Connection, value: i64) -> Result<()> {
    conn.prepare_cached("DELETE FROM argument_values WHERE id = ?1 AND kind = 'Variable'")?
        .execute(params![value])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_document;
    use crate::testing::{compile_until_loaded, SCHEMA};

    fn inline(documents: &[&str]) -> (Store, InlineOutput) {
        let store = compile_until_loaded(SCHEMA, documents);
        let output = inline_fragment_arguments(&store, 2, &CancellationToken::new()).unwrap();
        assert!(output.diagnostics.is_empty(), "{}", output.diagnostics);
        (store, output)
    }

    fn clone_names(conn: &Connection, prefix: &str) -> Vec<String> {
        ir::all_documents(conn)
            .unwrap()
            .into_iter()
            .filter(|d| d.name.starts_with(&format!("{}_", prefix)))
            .map(|d| d.name)
            .collect()
    }

    #[test]
    fn test_literal_argument_is_inlined() {
        let (store, output) = inline(&[
            r#"fragment Named on Query @arguments(name: { type: "String!" }) { users(name: $name) { id } }"#,
            r#"query Q { ...Named @with(name: "Hello") }"#,
        ]);
        assert_eq!(output.clones, 1);
        let conn = store.connection().unwrap();

        let clones = clone_names(&conn, "Named");
        assert_eq!(clones.len(), 1);
        let clone = ir::find_document(&conn, &clones[0], DocumentKind::Fragment).unwrap().unwrap();
        let printed = print_document(&conn, clone.id).unwrap();
        assert!(printed.contains(r#"users(name: "Hello") {"#), "{}", printed);
        assert!(!printed.contains("@arguments"));

        let query = ir::find_document(&conn, "Q", DocumentKind::Query).unwrap().unwrap();
        let query_text = print_document(&conn, query.id).unwrap();
        assert!(query_text.contains(&format!("...{} @with", clones[0])), "{}", query_text);

        // The template keeps its variable
        let template = ir::find_document(&conn, "Named", DocumentKind::Fragment).unwrap().unwrap();
        assert!(print_document(&conn, template.id).unwrap().contains("users(name: $name)"));
    }

    #[test]
    fn test_default_value_is_used() {
        let (store, _) = inline(&[
            r#"fragment Sized on User @arguments(size: { type: "Int", default: 50 }) { avatar(size: $size) }"#,
            "query Q { user { ...Sized } }",
        ]);
        let conn = store.connection().unwrap();
        let clones = clone_names(&conn, "Sized");
        assert_eq!(clones.len(), 1);
        let clone = ir::find_document(&conn, &clones[0], DocumentKind::Fragment).unwrap().unwrap();
        assert!(print_document(&conn, clone.id).unwrap().contains("avatar(size: 50)"));
    }

    #[test]
    fn test_missing_value_becomes_null() {
        let (store, _) = inline(&[
            r#"fragment Sized on User @arguments(size: { type: "Int" }) { avatar(size: $size) }"#,
            "query Q { user { ...Sized @with(other: 1) } }",
        ]);
        let conn = store.connection().unwrap();
        let clones = clone_names(&conn, "Sized");
        let clone = ir::find_document(&conn, &clones[0], DocumentKind::Fragment).unwrap().unwrap();
        assert!(print_document(&conn, clone.id).unwrap().contains("avatar(size: null)"));
    }

    #[test]
    fn test_identical_spreads_share_a_clone() {
        let (store, output) = inline(&[
            r#"fragment Sized on User @arguments(size: { type: "Int" }) { avatar(size: $size) }"#,
            "query A { user { ...Sized @with(size: 10) } }",
            "query B { user { ...Sized @with(size: 10) } }",
            "query C { user { ...Sized @with(size: 20) } }",
        ]);
        assert_eq!(output.clones, 2);
        let conn = store.connection().unwrap();
        assert_eq!(clone_names(&conn, "Sized").len(), 2);
    }

    #[test]
    fn test_nested_spreads_use_the_clone_scope() {
        let (store, output) = inline(&[
            r#"fragment Inner on User @arguments(size: { type: "Int" }) { avatar(size: $size) }"#,
            r#"fragment Outer on User @arguments(outer: { type: "Int" }) { ...Inner @with(size: $outer) }"#,
            "query Q { user { ...Outer @with(outer: 7) } }",
        ]);
        assert_eq!(output.clones, 2);
        let conn = store.connection().unwrap();
        let inner = clone_names(&conn, "Inner");
        assert_eq!(inner.len(), 1);
        let clone = ir::find_document(&conn, &inner[0], DocumentKind::Fragment).unwrap().unwrap();
        assert!(print_document(&conn, clone.id).unwrap().contains("avatar(size: 7)"));
    }

    #[test]
    fn test_clone_owns_substituted_values() {
        let (store, _) = inline(&[
            r#"fragment Named on Query @arguments(name: { type: "String!" }) { users(name: $name) { id } }"#,
            r#"query Q { ...Named @with(name: "Hello") }"#,
        ]);
        let conn = store.connection().unwrap();
        let clone = clone_names(&conn, "Named").remove(0);
        let clone = ir::find_document(&conn, &clone, DocumentKind::Fragment).unwrap().unwrap();
        let query = ir::find_document(&conn, "Q", DocumentKind::Query).unwrap().unwrap();

        let owners = |sql: &str, document: i64| -> Vec<(i64, Option<i64>)> {
            ir::query_all(&conn, sql, params![document], |row| Ok((row.get(0)?, row.get(1)?)))
                .unwrap()
        };
        let substituted = owners(
            r#"
            SELECT v.id, v.document FROM selection_arguments a
            JOIN selection_refs r ON r.child_id = a.selection_id
            JOIN argument_values v ON v.id = a.value
            WHERE r.document = ?1
            "#,
            clone.id,
        );
        let applied = owners(
            r#"
            SELECT v.id, v.document FROM selection_directive_arguments a
            JOIN selection_directives d ON d.id = a.parent
            JOIN selection_refs r ON r.child_id = d.selection_id
            JOIN argument_values v ON v.id = a.value
            WHERE r.document = ?1
            "#,
            query.id,
        );
        assert_eq!(substituted.len(), 1);
        assert_eq!(applied.len(), 1);
        assert_ne!(substituted[0].0, applied[0].0);
        assert_eq!(substituted[0].1, Some(clone.id));
        assert_eq!(applied[0].1, Some(query.id));
    }

    #[test]
    fn test_operation_variables_pass_through() {
        let (store, _) = inline(&[
            r#"fragment Sized on User @arguments(size: { type: "Int" }) { avatar(size: $size) }"#,
            "query Q($s: Int) { user { ...Sized @with(size: $s) } }",
        ]);
        let conn = store.connection().unwrap();
        let clones = clone_names(&conn, "Sized");
        let clone = ir::find_document(&conn, &clones[0], DocumentKind::Fragment).unwrap().unwrap();
        assert!(print_document(&conn, clone.id).unwrap().contains("avatar(size: $s)"));
    }
}
