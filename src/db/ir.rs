//! Statements shared by the compiler passes
//!
//! Every helper takes a plain `&Connection` so it can run on a pooled
//! connection or inside a transaction. Statements are prepared once per
//! connection through the statement cache.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use crate::diagnostics::Location;
use crate::types::{DocumentKind, SelectionKind, TypeKind, ValueKind};
use crate::values::{ArgumentValue, ValueChild};

/// Step a cached statement to completion, mapping every row
pub fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, f)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Decode a string-backed enum column, failing on a value `parse` rejects
pub fn enum_column<T>(
    row: &Row<'_>,
    index: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            format!("unknown kind {}", text).into(),
        )
    })
}

// =========================================================================
// Locations
// =========================================================================

/// Where a raw document sits in its host file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLocation {
    pub filepath: String,
    pub offset_line: u32,
    pub offset_column: u32,
}

impl RawLocation {
    /// Absolute location of a document-relative position
    pub fn at(&self, row: i64, column: i64) -> Location {
        Location::offset(
            self.filepath.clone(),
            (self.offset_line, self.offset_column),
            (row.max(0) as u32, column.max(0) as u32),
        )
    }
}

pub fn raw_location(conn: &Connection, raw_document: i64) -> Result<RawLocation> {
    conn.prepare_cached(
        "SELECT filepath, offset_line, offset_column FROM raw_documents WHERE id = ?1",
    )?
    .query_row(params![raw_document], |row| {
        Ok(RawLocation {
            filepath: row.get(0)?,
            offset_line: row.get::<_, i64>(1)? as u32,
            offset_column: row.get::<_, i64>(2)? as u32,
        })
    })
    .optional()?
    .ok_or_else(|| anyhow!("raw document {} does not exist", raw_document))
}

// =========================================================================
// Schema Lookups
// =========================================================================

/// A type reference split into base name and modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub modifiers: String,
}

impl TypeRef {
    pub fn is_list(&self) -> bool {
        self.modifiers.contains(']')
    }

    pub fn is_non_null(&self) -> bool {
        self.modifiers.ends_with('!')
    }
}

/// Return type of `<Parent>.<field>`
pub fn type_field(conn: &Connection, id: &str) -> Result<Option<TypeRef>> {
    Ok(conn
        .prepare_cached("SELECT type, type_modifiers FROM type_fields WHERE id = ?1")?
        .query_row(params![id], |row| {
            Ok(TypeRef {
                name: row.get(0)?,
                modifiers: row.get(1)?,
            })
        })
        .optional()?)
}

/// Type of `<Parent>.<field>.<argument>`
pub fn field_argument(conn: &Connection, id: &str) -> Result<Option<TypeRef>> {
    Ok(conn
        .prepare_cached("SELECT type, type_modifiers FROM type_field_arguments WHERE id = ?1")?
        .query_row(params![id], |row| {
            Ok(TypeRef {
                name: row.get(0)?,
                modifiers: row.get(1)?,
            })
        })
        .optional()?)
}

/// Declared type of a directive argument
pub fn directive_argument(conn: &Connection, directive: &str, name: &str) -> Result<Option<TypeRef>> {
    Ok(conn
        .prepare_cached(
            "SELECT type, type_modifiers FROM directive_arguments WHERE parent = ?1 AND name = ?2",
        )?
        .query_row(params![directive, name], |row| {
            Ok(TypeRef {
                name: row.get(0)?,
                modifiers: row.get(1)?,
            })
        })
        .optional()?)
}

pub fn type_kind(conn: &Connection, name: &str) -> Result<Option<TypeKind>> {
    let kind: Option<String> = conn
        .prepare_cached("SELECT kind FROM types WHERE name = ?1")?
        .query_row(params![name], |row| row.get(0))
        .optional()?;
    Ok(kind.as_deref().and_then(TypeKind::from_str))
}

/// Root type of an operation kind (`Query`, `Mutation`, `Subscription`)
pub fn root_type(conn: &Connection, kind: DocumentKind) -> Result<Option<String>> {
    Ok(conn
        .prepare_cached("SELECT name FROM types WHERE operation = ?1")?
        .query_row(params![kind.as_str()], |row| row.get(0))
        .optional()?)
}

/// Key fields of a type: the per-type override, else the project default
pub fn type_keys(conn: &Connection, type_name: &str) -> Result<Vec<String>> {
    query_all(
        conn,
        r#"
        SELECT value FROM json_each(COALESCE(
            (SELECT keys FROM type_configs WHERE name = ?1 AND keys IS NOT NULL),
            (SELECT default_keys FROM config WHERE id = 1),
            '["id"]'
        ))
        "#,
        params![type_name],
        |row| row.get(0),
    )
}

// =========================================================================
// Documents
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub id: i64,
    pub name: String,
    pub raw_document: i64,
    pub kind: DocumentKind,
    pub type_condition: Option<String>,
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        raw_document: row.get(2)?,
        kind: enum_column(row, 3, DocumentKind::from_str)?,
        type_condition: row.get(4)?,
    })
}

pub fn insert_document(
    conn: &Connection,
    name: &str,
    raw_document: i64,
    kind: DocumentKind,
    type_condition: Option<&str>,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO documents (name, raw_document, kind, type_condition, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?
    .execute(params![
        name,
        raw_document,
        kind.as_str(),
        type_condition,
        position.0,
        position.1
    ])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_document(conn: &Connection, id: i64) -> Result<Option<DocumentRow>> {
    Ok(conn
        .prepare_cached(
            "SELECT id, name, raw_document, kind, type_condition FROM documents WHERE id = ?1",
        )?
        .query_row(params![id], row_to_document)
        .optional()?)
}

/// Find a document by name and kind (the first one if names collide)
pub fn find_document(conn: &Connection, name: &str, kind: DocumentKind) -> Result<Option<DocumentRow>> {
    Ok(conn
        .prepare_cached(
            r#"
            SELECT id, name, raw_document, kind, type_condition FROM documents
            WHERE name = ?1 AND kind = ?2 ORDER BY id LIMIT 1
            "#,
        )?
        .query_row(params![name, kind.as_str()], row_to_document)
        .optional()?)
}

pub fn all_documents(conn: &Connection) -> Result<Vec<DocumentRow>> {
    query_all(
        conn,
        "SELECT id, name, raw_document, kind, type_condition FROM documents ORDER BY id",
        [],
        row_to_document,
    )
}

/// A variable declared by an operation or a fragment's `@arguments`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRow {
    pub id: i64,
    pub name: String,
    pub type_name: String,
    pub modifiers: String,
    pub default_value: Option<i64>,
}

pub fn insert_document_variable(
    conn: &Connection,
    document: i64,
    name: &str,
    type_ref: &TypeRef,
    default_value: Option<i64>,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO document_variables (document, name, type, type_modifiers, default_value, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?
    .execute(params![
        document,
        name,
        type_ref.name,
        type_ref.modifiers,
        default_value,
        position.0,
        position.1
    ])?;
    Ok(conn.last_insert_rowid())
}

pub fn document_variables(conn: &Connection, document: i64) -> Result<Vec<VariableRow>> {
    query_all(
        conn,
        r#"
        SELECT id, name, type, type_modifiers, default_value
        FROM document_variables WHERE document = ?1 ORDER BY id
        "#,
        params![document],
        |row| {
            Ok(VariableRow {
                id: row.get(0)?,
                name: row.get(1)?,
                type_name: row.get(2)?,
                modifiers: row.get(3)?,
                default_value: row.get(4)?,
            })
        },
    )
}

pub fn insert_document_directive(
    conn: &Connection,
    document: i64,
    directive: &str,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO document_directives (document, directive, row, column) VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(params![document, directive, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_document_directive_argument(
    conn: &Connection,
    parent: i64,
    name: &str,
    value: i64,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO document_directive_arguments (parent, name, value, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?
    .execute(params![parent, name, value, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

pub fn document_has_directive(conn: &Connection, document: i64, directive: &str) -> Result<bool> {
    Ok(conn
        .prepare_cached(
            "SELECT 1 FROM document_directives WHERE document = ?1 AND directive = ?2 LIMIT 1",
        )?
        .query_row(params![document, directive], |_| Ok(()))
        .optional()?
        .is_some())
}

// =========================================================================
// Selections
// =========================================================================

pub fn insert_selection(
    conn: &Connection,
    field_name: &str,
    alias: Option<&str>,
    kind: SelectionKind,
    type_id: Option<&str>,
) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO selections (field_name, alias, kind, type) VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(params![field_name, alias, kind.as_str(), type_id])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_selection_ref(
    conn: &Connection,
    parent: Option<i64>,
    child: i64,
    document: i64,
    path_index: i64,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO selection_refs (parent_id, child_id, document, path_index, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?
    .execute(params![parent, child, document, path_index, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_selection_argument(
    conn: &Connection,
    selection: i64,
    name: &str,
    value: i64,
    field_argument: Option<&str>,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO selection_arguments (selection_id, name, value, field_argument, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?
    .execute(params![selection, name, value, field_argument, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_selection_directive(
    conn: &Connection,
    selection: i64,
    directive: &str,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO selection_directives (selection_id, directive, row, column)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?
    .execute(params![selection, directive, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_selection_directive_argument(
    conn: &Connection,
    parent: i64,
    name: &str,
    value: i64,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO selection_directive_arguments (parent, name, value, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?
    .execute(params![parent, name, value, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

// =========================================================================
// Argument Values
// =========================================================================

pub fn insert_argument_value(
    conn: &Connection,
    kind: ValueKind,
    raw: &str,
    expected: Option<&TypeRef>,
    document: Option<i64>,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO argument_values (kind, raw, expected_type, expected_type_modifiers, document, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?
    .execute(params![
        kind.as_str(),
        raw,
        expected.map(|t| t.name.as_str()),
        expected.map(|t| t.modifiers.as_str()),
        document,
        position.0,
        position.1
    ])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_value_child(
    conn: &Connection,
    parent: i64,
    value: i64,
    name: Option<&str>,
    position: (i64, i64),
) -> Result<i64> {
    conn.prepare_cached(
        r#"
        INSERT INTO argument_value_children (parent, value, name, row, column)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?
    .execute(params![parent, value, name, position.0, position.1])?;
    Ok(conn.last_insert_rowid())
}

/// Insert a whole value tree. `expected` resolves the expected type of an
/// object field from the parent's expected type.
pub fn insert_value_tree(
    conn: &Connection,
    value: &ArgumentValue,
    expected: Option<&TypeRef>,
    document: Option<i64>,
    position: (i64, i64),
) -> Result<i64> {
    let id = insert_argument_value(conn, value.kind, &value.raw, expected, document, position)?;
    for child in &value.children {
        let child_expected = match (&child.name, expected) {
            // List entries drop one wrapper layer
            (None, Some(parent)) => Some(TypeRef {
                name: parent.name.clone(),
                modifiers: strip_list_layer(&parent.modifiers).to_string(),
            }),
            (Some(field), Some(parent)) => type_field(conn, &format!("{}.{}", parent.name, field))?,
            (_, None) => None,
        };
        let child_id =
            insert_value_tree(conn, &child.value, child_expected.as_ref(), document, position)?;
        insert_value_child(conn, id, child_id, child.name.as_deref(), position)?;
    }
    Ok(id)
}

/// `!]!` -> `!`, `]` -> ``
pub fn strip_list_layer(modifiers: &str) -> &str {
    let trimmed = modifiers.strip_suffix('!').unwrap_or(modifiers);
    trimmed.strip_suffix(']').unwrap_or(trimmed)
}

/// Load a value and its descendants
pub fn load_value(conn: &Connection, id: i64) -> Result<ArgumentValue> {
    let (kind, raw): (String, String) = conn
        .prepare_cached("SELECT kind, raw FROM argument_values WHERE id = ?1")?
        .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?
        .ok_or_else(|| anyhow!("argument value {} does not exist", id))?;
    let kind = ValueKind::from_str(&kind).ok_or_else(|| anyhow!("unknown value kind {}", kind))?;

    let children = query_all(
        conn,
        "SELECT value, name FROM argument_value_children WHERE parent = ?1 ORDER BY id",
        params![id],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
    )?;
    let mut value = ArgumentValue::scalar(kind, raw);
    for (child, name) in children {
        value.children.push(ValueChild {
            name,
            value: load_value(conn, child)?,
        });
    }
    Ok(value)
}

// =========================================================================
// Selection Trees
// =========================================================================

/// A directive and its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveNode {
    pub name: String,
    pub arguments: Vec<(String, ArgumentValue)>,
}

/// A selection placed in a document, with its subtree
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionNode {
    pub id: i64,
    pub kind: SelectionKind,
    pub field_name: String,
    pub alias: Option<String>,
    pub type_id: Option<String>,
    pub arguments: Vec<(String, ArgumentValue)>,
    pub directives: Vec<DirectiveNode>,
    pub children: Vec<SelectionNode>,
}

impl SelectionNode {
    /// Name the selection is exposed under
    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field_name)
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveNode> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn child(&self, field_name: &str) -> Option<&SelectionNode> {
        self.children.iter().find(|c| c.field_name == field_name)
    }
}

struct RefRow {
    parent: Option<i64>,
    child: i64,
    kind: SelectionKind,
    field_name: String,
    alias: Option<String>,
    type_id: Option<String>,
}

/// Export the selection tree of a document
pub fn selection_tree(conn: &Connection, document: i64) -> Result<Vec<SelectionNode>> {
    let refs = query_all(
        conn,
        r#"
        SELECT r.parent_id, r.child_id, s.kind, s.field_name, s.alias, s.type
        FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        WHERE r.document = ?1
        ORDER BY r.path_index, r.id
        "#,
        params![document],
        |row| {
            Ok(RefRow {
                parent: row.get(0)?,
                child: row.get(1)?,
                kind: enum_column(row, 2, SelectionKind::from_str)?,
                field_name: row.get(3)?,
                alias: row.get(4)?,
                type_id: row.get(5)?,
            })
        },
    )?;

    let mut by_parent: HashMap<Option<i64>, Vec<&RefRow>> = HashMap::new();
    for r in &refs {
        by_parent.entry(r.parent).or_default().push(r);
    }
    build_level(conn, &by_parent, None, 0)
}

fn build_level(
    conn: &Connection,
    by_parent: &HashMap<Option<i64>, Vec<&RefRow>>,
    parent: Option<i64>,
    depth: usize,
) -> Result<Vec<SelectionNode>> {
    // A reference cycle would otherwise recurse forever
    if depth > 256 {
        return Err(anyhow!("selection tree deeper than 256 levels"));
    }
    let Some(rows) = by_parent.get(&parent) else {
        return Ok(Vec::new());
    };
    let mut nodes = Vec::with_capacity(rows.len());
    for r in rows {
        nodes.push(SelectionNode {
            id: r.child,
            kind: r.kind,
            field_name: r.field_name.clone(),
            alias: r.alias.clone(),
            type_id: r.type_id.clone(),
            arguments: selection_arguments(conn, r.child)?,
            directives: selection_directives(conn, r.child)?,
            children: build_level(conn, by_parent, Some(r.child), depth + 1)?,
        });
    }
    Ok(nodes)
}

/// Arguments of a selection, in declaration order
pub fn selection_arguments(conn: &Connection, selection: i64) -> Result<Vec<(String, ArgumentValue)>> {
    let rows = query_all(
        conn,
        "SELECT name, value FROM selection_arguments WHERE selection_id = ?1 ORDER BY id",
        params![selection],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    )?;
    rows.into_iter()
        .map(|(name, value)| Ok((name, load_value(conn, value)?)))
        .collect()
}

/// Directives of a selection, in declaration order
pub fn selection_directives(conn: &Connection, selection: i64) -> Result<Vec<DirectiveNode>> {
    let directives = query_all(
        conn,
        "SELECT id, directive FROM selection_directives WHERE selection_id = ?1 ORDER BY id",
        params![selection],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;
    let mut nodes = Vec::with_capacity(directives.len());
    for (id, name) in directives {
        let arguments = query_all(
            conn,
            "SELECT name, value FROM selection_directive_arguments WHERE parent = ?1 ORDER BY id",
            params![id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?
        .into_iter()
        .map(|(name, value)| Ok((name, load_value(conn, value)?)))
        .collect::<Result<Vec<_>>>()?;
        nodes.push(DirectiveNode { name, arguments });
    }
    Ok(nodes)
}

/// Directives of a document, in declaration order
pub fn document_directives(conn: &Connection, document: i64) -> Result<Vec<DirectiveNode>> {
    let directives = query_all(
        conn,
        "SELECT id, directive FROM document_directives WHERE document = ?1 ORDER BY id",
        params![document],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;
    let mut nodes = Vec::with_capacity(directives.len());
    for (id, name) in directives {
        let arguments = query_all(
            conn,
            "SELECT name, value FROM document_directive_arguments WHERE parent = ?1 ORDER BY id",
            params![id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?
        .into_iter()
        .map(|(name, value)| Ok((name, load_value(conn, value)?)))
        .collect::<Result<Vec<_>>>()?;
        nodes.push(DirectiveNode { name, arguments });
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn seed_raw(conn: &Connection) -> i64 {
        crate::db::insert_raw_document(conn, &crate::types::RawDocument::new("a.graphql", ""))
            .unwrap()
    }

    #[test]
    fn test_strip_list_layer() {
        assert_eq!(strip_list_layer("!]!"), "!");
        assert_eq!(strip_list_layer("]"), "");
        assert_eq!(strip_list_layer("!]]!"), "!]");
        assert_eq!(strip_list_layer(""), "");
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let store = Store::in_memory().unwrap();
        let conn = store.connection().unwrap();
        let decode = |sql: &str| {
            conn.query_row(sql, [], |row| enum_column(row, 0, SelectionKind::from_str))
        };
        assert_eq!(decode("SELECT 'inline_fragment'").unwrap(), SelectionKind::InlineFragment);
        let err = decode("SELECT 'spread'").unwrap_err();
        assert!(err.to_string().contains("unknown kind spread"), "{}", err);
    }

    #[test]
    fn test_value_tree_roundtrip() {
        let store = Store::in_memory().unwrap();
        let conn = store.connection().unwrap();
        let raw = seed_raw(&conn);
        let doc = insert_document(&conn, "Q", raw, DocumentKind::Query, None, (1, 1)).unwrap();

        let value = ArgumentValue::composite(
            ValueKind::List,
            vec![
                ValueChild {
                    name: None,
                    value: ArgumentValue::scalar(ValueKind::Int, "1"),
                },
                ValueChild {
                    name: None,
                    value: ArgumentValue::scalar(ValueKind::Variable, "two"),
                },
            ],
        );
        let id = insert_value_tree(&conn, &value, None, Some(doc), (1, 1)).unwrap();
        let loaded = load_value(&conn, id).unwrap();
        assert_eq!(loaded, value);
        assert_eq!(loaded.print(), "[1, $two]");
    }

    #[test]
    fn test_selection_tree_follows_document_refs() {
        let store = Store::in_memory().unwrap();
        let conn = store.connection().unwrap();
        let raw = seed_raw(&conn);
        let first = insert_document(&conn, "A", raw, DocumentKind::Query, None, (1, 1)).unwrap();
        let second = insert_document(&conn, "B", raw, DocumentKind::Query, None, (1, 1)).unwrap();

        let user = insert_selection(&conn, "user", None, SelectionKind::Field, Some("Query.user"))
            .unwrap();
        let id = insert_selection(&conn, "id", None, SelectionKind::Field, Some("User.id")).unwrap();
        let name =
            insert_selection(&conn, "name", None, SelectionKind::Field, Some("User.name")).unwrap();
        insert_selection_ref(&conn, None, user, first, 0, (1, 1)).unwrap();
        insert_selection_ref(&conn, Some(user), id, first, 0, (1, 1)).unwrap();
        // The second document shares `user` but selects `name` under it
        insert_selection_ref(&conn, None, user, second, 0, (1, 1)).unwrap();
        insert_selection_ref(&conn, Some(user), name, second, 0, (1, 1)).unwrap();

        let tree = selection_tree(&conn, first).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].field_name, "id");

        let tree = selection_tree(&conn, second).unwrap();
        assert_eq!(tree[0].children[0].field_name, "name");
    }

    #[test]
    fn test_type_keys_default_and_override() {
        let store = Store::in_memory().unwrap();
        let mut config = crate::config::ProjectConfig::default();
        config.types.insert(
            "Ghost".to_string(),
            crate::config::TypeConfig {
                keys: Some(vec!["name".to_string(), "aka".to_string()]),
                resolve_query: None,
            },
        );
        store.write_config(&config).unwrap();
        let conn = store.connection().unwrap();
        assert_eq!(type_keys(&conn, "User").unwrap(), vec!["id".to_string()]);
        assert_eq!(
            type_keys(&conn, "Ghost").unwrap(),
            vec!["name".to_string(), "aka".to_string()]
        );
    }
}
