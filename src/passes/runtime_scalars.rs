//! Runtime scalars
//!
//! A runtime scalar is a variable type the client fills in itself (a session
//! id, say). The server only knows the static scalar it is sent as, so the
//! variable is retyped and tagged with the original name.

use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::info;

use crate::config::ProjectConfig;
use crate::constants::{RUNTIME_SCALAR_DIRECTIVE, RUNTIME_SCALAR_TYPE_ARG};
use crate::db::ir::{self, TypeRef};
use crate::types::ValueKind;

/// Retype every variable declared with a configured runtime scalar
pub fn rewrite_runtime_scalars(conn: &Connection, config: &ProjectConfig) -> Result<usize> {
    let mut rewritten = 0;
    for (runtime, static_type) in &config.runtime_scalars {
        let variables = ir::query_all(
            conn,
            "SELECT id, document, row, column FROM document_variables WHERE type = ?1",
            params![runtime],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        for (id, document, row, column) in variables {
            conn.prepare_cached("UPDATE document_variables SET type = ?1 WHERE id = ?2")?
                .execute(params![static_type, id])?;

            conn.prepare_cached(
                r#"
                INSERT INTO document_variable_directives (parent, directive, row, column)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?
            .execute(params![id, RUNTIME_SCALAR_DIRECTIVE, row, column])?;
            let directive = conn.last_insert_rowid();

            let expected = TypeRef {
                name: "String".to_string(),
                modifiers: "!".to_string(),
            };
            let value = ir::insert_argument_value(
                conn,
                ValueKind::String,
                runtime,
                Some(&expected),
                Some(document),
                (row, column),
            )?;
            conn.prepare_cached(
                r#"
                INSERT INTO document_variable_directive_arguments (parent, name, value)
                VALUES (?1, ?2, ?3)
                "#,
            )?
            .execute(params![directive, RUNTIME_SCALAR_TYPE_ARG, value])?;
            rewritten += 1;
        }
    }
    info!("Rewrote {} runtime scalar variables", rewritten);
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::compile_until_loaded;

    #[test]
    fn test_runtime_scalar_is_replaced() {
        let mut config = ProjectConfig::default();
        config
            .runtime_scalars
            .insert("ViewerIDFromSession".to_string(), "ID".to_string());
        let store = compile_until_loaded(
            "scalar ViewerIDFromSession type User { id: ID! } type Query { user(id: ID!): User }",
            &["query Viewer($id: ViewerIDFromSession!) { user(id: $id) { id } }"],
        );

        let conn = store.connection().unwrap();
        assert_eq!(rewrite_runtime_scalars(&conn, &config).unwrap(), 1);

        let (type_name, modifiers): (String, String) = conn
            .query_row(
                "SELECT type, type_modifiers FROM document_variables WHERE name = 'id'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(type_name, "ID");
        assert_eq!(modifiers, "!");

        let original: String = conn
            .query_row(
                r#"
                SELECT v.raw FROM document_variable_directives d
                JOIN document_variable_directive_arguments a ON a.parent = d.id
                JOIN argument_values v ON v.id = a.value
                WHERE d.directive = '__houdini__runtimeScalar' AND a.name = 'type'
                "#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(original, "ViewerIDFromSession");
    }

    #[test]
    fn test_other_variables_untouched() {
        let config = ProjectConfig::default();
        let store = compile_until_loaded(
            "type User { id: ID! } type Query { user(id: ID!): User }",
            &["query Viewer($id: ID!) { user(id: $id) { id } }"],
        );
        let conn = store.connection().unwrap();
        assert_eq!(rewrite_runtime_scalars(&conn, &config).unwrap(), 0);
    }
}
