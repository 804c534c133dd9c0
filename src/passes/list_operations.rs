//! List operation fragments
//!
//! Every named list gets three fragments the runtime uses to update it after
//! a mutation: `<name>_insert` and `<name>_toggle` carry the list's own
//! selection, `<name>_remove` only what identifies a record. Each node type
//! also gets a `<Type>_delete` directive.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::info;

use crate::constants::{
    delete_directive_name, INSERT_SUFFIX, REMOVE_SUFFIX, TOGGLE_SUFFIX, TYPENAME_FIELD,
};
use crate::db::ir;
use crate::passes::lists::discovered_lists;
use crate::types::{DiscoveredList, DocumentKind, SelectionKind};

struct RefRow {
    child: i64,
    path_index: i64,
    row: i64,
    column: i64,
}

/// Generate the operation fragments of every named list
pub fn generate_list_operations(conn: &Connection) -> Result<usize> {
    let lists: Vec<DiscoveredList> = discovered_lists(conn)?
        .into_iter()
        .filter(|list| !list.name.is_empty())
        .collect();

    for list in &lists {
        let keys = ir::type_keys(conn, &list.node_type)?;
        let position = list_position(conn, list)?;

        for suffix in [INSERT_SUFFIX, TOGGLE_SUFFIX] {
            let document = ir::insert_document(
                conn,
                &format!("{}{}", list.name, suffix),
                list.raw_document,
                DocumentKind::Fragment,
                Some(&list.node_type),
                position,
            )?;
            copy_subtree(conn, list.document, list.node, None, document)?;

            let selected: HashSet<String> = ir::query_all(
                conn,
                r#"
                SELECT s.field_name FROM selection_refs r
                JOIN selections s ON s.id = r.child_id
                WHERE r.document = ?1 AND r.parent_id IS NULL AND s.kind = 'field' AND s.alias IS NULL
                "#,
                params![document],
                |row| row.get(0),
            )?
            .into_iter()
            .collect();
            let missing: Vec<&str> = keys
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(TYPENAME_FIELD))
                .filter(|field| !selected.contains(*field))
                .collect();
            append_fields(conn, document, &list.node_type, &missing, position)?;
        }

        let remove = ir::insert_document(
            conn,
            &format!("{}{}", list.name, REMOVE_SUFFIX),
            list.raw_document,
            DocumentKind::Fragment,
            Some(&list.node_type),
            position,
        )?;
        let fields: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(TYPENAME_FIELD))
            .collect();
        append_fields(conn, remove, &list.node_type, &fields, position)?;

        insert_delete_directive(conn, &list.node_type)?;
    }

    info!("Generated operation fragments for {} lists", lists.len());
    Ok(lists.len())
}

/// Place the selections below `parent` in `source` into `target`. The
/// selections themselves are shared; only the placements are new.
fn copy_subtree(
    conn: &Connection,
    source: i64,
    parent: i64,
    target_parent: Option<i64>,
    target: i64,
) -> Result<()> {
    let refs = ir::query_all(
        conn,
        r#"
        SELECT child_id, path_index, row, column FROM selection_refs
        WHERE document = ?1 AND parent_id = ?2
        ORDER BY path_index, id
        "#,
        params![source, parent],
        |row| {
            Ok(RefRow {
                child: row.get(0)?,
                path_index: row.get(1)?,
                row: row.get(2)?,
                column: row.get(3)?,
            })
        },
    )?;
    for r in refs {
        ir::insert_selection_ref(conn, target_parent, r.child, target, r.path_index, (r.row, r.column))?;
        copy_subtree(conn, source, r.child, Some(r.child), target)?;
    }
    Ok(())
}

/// Append fresh root field selections to a generated fragment
fn append_fields(
    conn: &Connection,
    document: i64,
    type_name: &str,
    fields: &[&str],
    position: (i64, i64),
) -> Result<()> {
    let next: i64 = conn
        .prepare_cached(
            "SELECT COALESCE(MAX(path_index) + 1, 0) FROM selection_refs WHERE document = ?1 AND parent_id IS NULL",
        )?
        .query_row(params![document], |row| row.get(0))?;
    for (i, field) in fields.iter().enumerate() {
        let type_id = format!("{}.{}", type_name, field);
        let selection = ir::insert_selection(conn, field, None, SelectionKind::Field, Some(&type_id))?;
        ir::insert_selection_ref(conn, None, selection, document, next + i as i64, position)?;
    }
    Ok(())
}

fn list_position(conn: &Connection, list: &DiscoveredList) -> Result<(i64, i64)> {
    Ok(ir::query_all(
        conn,
        "SELECT row, column FROM selection_refs WHERE child_id = ?1 AND document = ?2 ORDER BY id LIMIT 1",
        params![list.list_field, list.document],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?
    .into_iter()
    .next()
    .unwrap_or((0, 0)))
}

fn insert_delete_directive(conn: &Connection, type_name: &str) -> Result<()> {
    let name = delete_directive_name(type_name);
    conn.prepare_cached(
        r#"
        INSERT OR IGNORE INTO directives (name, repeatable, internal, visible, description)
        VALUES (?1, 0, 1, 1, ?2)
        "#,
    )?
    .execute(params![
        name,
        format!("Delete the {} with the matching key", type_name)
    ])?;
    conn.prepare_cached(
        "INSERT OR IGNORE INTO directive_locations (directive, location) VALUES (?1, 'FIELD')",
    )?
    .execute(params![name])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::printer::print_document;
    use crate::testing::{compile_until_discovered, SCHEMA};

    fn generate(documents: &[&str]) -> crate::db::Store {
        let (store, diagnostics) =
            compile_until_discovered(SCHEMA, documents, &ProjectConfig::default());
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        generate_list_operations(&store.connection().unwrap()).unwrap();
        store
    }

    fn printed(conn: &Connection, name: &str) -> String {
        let document = ir::find_document(conn, name, DocumentKind::Fragment)
            .unwrap()
            .unwrap_or_else(|| panic!("{} was not generated", name));
        print_document(conn, document.id).unwrap()
    }

    #[test]
    fn test_named_list_fragments() {
        let store = generate(&[r#"query Q { users @list(name: "All_Users") { firstName } }"#]);
        let conn = store.connection().unwrap();

        let expected = "fragment All_Users_insert on User {\n  firstName\n  id\n  __typename\n}";
        assert_eq!(printed(&conn, "All_Users_insert"), expected);
        assert_eq!(
            printed(&conn, "All_Users_toggle"),
            expected.replace("_insert", "_toggle")
        );
        assert_eq!(
            printed(&conn, "All_Users_remove"),
            "fragment All_Users_remove on User {\n  id\n  __typename\n}"
        );

        let deletes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM directives WHERE name = 'User_delete' AND internal = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_nested_selection_is_copied() {
        let store = generate(&[
            r#"query Q { userConnection @list(name: "Conn") { edges { node { id friendsList { firstName } } } } }"#,
        ]);
        let conn = store.connection().unwrap();
        assert_eq!(
            printed(&conn, "Conn_insert"),
            "fragment Conn_insert on User {\n  id\n  friendsList {\n    firstName\n  }\n  __typename\n}"
        );
    }

    #[test]
    fn test_delete_directive_once_per_type() {
        let store = generate(&[
            r#"query A { users @list(name: "A") { id } }"#,
            r#"query B { users @list(name: "B") { id } }"#,
        ]);
        let conn = store.connection().unwrap();
        let deletes: i64 = conn
            .query_row("SELECT COUNT(*) FROM directives WHERE name = 'User_delete'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_unnamed_lists_are_skipped() {
        let store = generate(&["query Q { users(limit: 1) @paginate { id } }"]);
        let conn = store.connection().unwrap();
        assert_eq!(generate_list_operations(&conn).unwrap(), 0);
        assert!(ir::find_document(&conn, "_insert", DocumentKind::Fragment)
            .unwrap()
            .is_none());
    }
}
