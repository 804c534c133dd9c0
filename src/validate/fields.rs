//! Field rules: unknown fields and aliased keys

use anyhow::Result;
use rusqlite::Connection;

use super::location;
use crate::config::ProjectConfig;
use crate::db::ir;
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Field selections whose `<Parent>.<field>` is not in the schema
///
/// The loader keeps these so component fields registered later resolve.
pub fn validate_unknown_fields(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT s.type, d.raw_document, r.row, r.column
        FROM selection_refs r
        JOIN selections s ON s.id = r.child_id
        JOIN documents d ON d.id = r.document
        WHERE s.kind = 'field' AND s.type IS NOT NULL
          AND NOT EXISTS (SELECT 1 FROM type_fields tf WHERE tf.id = s.type)
        ORDER BY r.id
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
    for (type_id, raw, row, column) in rows {
        let (parent, field) = type_id.rsplit_once('.').unwrap_or(("", type_id.as_str()));
        diagnostics.push(Diagnostic::validation(
            format!("Cannot query field \"{}\" on type \"{}\"", field, parent),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

/// Aliases must not shadow a key field of the parent type
pub fn validate_no_key_alias(conn: &Connection, _config: &ProjectConfig) -> Result<Diagnostics> {
    let rows = ir::query_all(
        conn,
        r#"
        SELECT s.alias, tf.parent, d.raw_document, r.row, r.column
        FROM selections s
        JOIN selection_refs r ON r.child_id = s.id
        JOIN documents d ON d.id = r.document
        JOIN type_fields tf ON tf.id = s.type
        WHERE s.kind = 'field' AND s.alias IS NOT NULL AND s.alias != s.field_name
          AND s.alias IN (
              SELECT value FROM json_each(COALESCE(
                  (SELECT keys FROM type_configs WHERE name = tf.parent AND keys IS NOT NULL),
                  (SELECT default_keys FROM config WHERE id = 1),
                  '["id"]'
              ))
          )
        ORDER BY r.id
        "#,
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

    let mut diagnostics = Diagnostics::new();
    for (alias, parent, raw, row, column) in rows {
        diagnostics.push(Diagnostic::validation(
            format!("{} is a key of {} and can't be used as an alias", alias, parent),
            location(conn, raw, row, column)?,
        ));
    }
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeConfig;
    use crate::validate::tests::{check, check_with};

    #[test]
    fn test_unknown_field() {
        let diagnostics = check(validate_unknown_fields, &["query Q { user { nickname } }"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.as_slice()[0].message,
            "Cannot query field \"nickname\" on type \"User\""
        );
    }

    #[test]
    fn test_known_fields_pass() {
        let diagnostics = check(validate_unknown_fields, &["query Q { user { id firstName } }"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_key_alias() {
        let diagnostics = check(
            validate_no_key_alias,
            &["query Q { user { id: firstName same: id } users { id } }"],
        );
        assert_eq!(diagnostics.len(), 1);

        // Aliasing a field as itself is fine
        let diagnostics = check(validate_no_key_alias, &["query Q { user { id: id } }"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_key_alias_uses_type_keys() {
        let mut config = ProjectConfig::default();
        config.types.insert(
            "User".to_string(),
            TypeConfig {
                keys: Some(vec!["firstName".to_string()]),
                resolve_query: None,
            },
        );
        let diagnostics = check_with(
            validate_no_key_alias,
            &["query Q { user { id: firstName firstName: id } }"],
            &config,
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.as_slice()[0].message.starts_with("firstName"));
    }
}
