//! Validation suite
//!
//! Every rule is a query (or a few) over the IR that reports offending rows
//! as diagnostics and keeps going. Rules only read, except the pagination
//! arguments sweep which also records how each paginated list pages.
//!
//! The discovery sweeps run first, right after list discovery; the other
//! rules depend on what they record and run afterwards. Within each group
//! the rules run concurrently, each on its own pooled connection.

pub mod directives;
pub mod fields;
pub mod fragments;
pub mod lists;

use anyhow::Result;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::db::ir;
use crate::db::Store;
use crate::diagnostics::{Diagnostics, Location};
use crate::worker::run_pool;

/// A validation rule
pub type Rule = fn(&Connection, &ProjectConfig) -> Result<Diagnostics>;

/// Sweeps that run right after list discovery
pub const DISCOVERY_SWEEPS: [(&str, Rule); 3] = [
    ("unknown directives", directives::validate_unknown_directives),
    ("unknown fragments", fragments::validate_unknown_fragments),
    ("paginate arguments", lists::validate_paginate_args),
];

/// Every other rule
pub const RULES: [(&str, Rule); 16] = [
    ("unknown fields", fields::validate_unknown_fields),
    ("key aliases", fields::validate_no_key_alias),
    ("required", directives::validate_required),
    ("mask directives", directives::validate_mask_directives),
    ("directive arguments", directives::validate_known_directive_arguments),
    ("loading", directives::validate_loading),
    ("optimistic key scalar", directives::validate_optimistic_key_scalar),
    ("optimistic key selection", directives::validate_optimistic_key_selection),
    ("conflicting directives", directives::validate_conflicting_directives),
    ("single paginate", lists::validate_single_paginate),
    ("paginate type condition", lists::validate_paginate_type_condition),
    ("parent id", lists::validate_parent_id),
    ("paginate with list", lists::validate_conflicting_paginate_list),
    ("missing with", fragments::validate_fragment_arguments_missing_with),
    ("with values", fragments::validate_fragment_argument_values),
    ("duplicate documents", fragments::validate_duplicate_documents),
];

/// Run the sweeps that follow list discovery
pub fn run_discovery_sweeps(
    store: &Store,
    config: &ProjectConfig,
    cancel: &CancellationToken,
) -> Result<Diagnostics> {
    run_concurrently(store, config, cancel, &DISCOVERY_SWEEPS)
}

/// Run the remaining rules
pub fn run_rules(store: &Store, config: &ProjectConfig, cancel: &CancellationToken) -> Result<Diagnostics> {
    run_concurrently(store, config, cancel, &RULES)
}

fn run_concurrently(
    store: &Store,
    config: &ProjectConfig,
    cancel: &CancellationToken,
    rules: &[(&'static str, Rule)],
) -> Result<Diagnostics> {
    let results = run_pool(rules.to_vec(), store.width(), cancel, |(name, rule)| {
        debug!("Running rule: {}", name);
        let conn = store.connection()?;
        rule(&conn, config)
    })?;

    let mut diagnostics = Diagnostics::new();
    for result in results {
        diagnostics.extend(result?);
    }
    info!("Validation reported {} diagnostics", diagnostics.len());
    Ok(diagnostics)
}

/// Absolute location of a position inside a raw document
pub(crate) fn location(conn: &Connection, raw_document: i64, row: i64, column: i64) -> Result<Location> {
    Ok(ir::raw_location(conn, raw_document)?.at(row, column))
}

/// Whether a placed selection has an ancestor returning a list
pub(crate) fn under_list(conn: &Connection, selection: i64, document: i64) -> Result<bool> {
    let found = ir::query_all(
        conn,
        r#"
        WITH RECURSIVE up(id) AS (
            SELECT parent_id FROM selection_refs
            WHERE child_id = ?1 AND document = ?2 AND parent_id IS NOT NULL
            UNION
            SELECT r.parent_id FROM selection_refs r
            JOIN up ON r.child_id = up.id
            WHERE r.document = ?2 AND r.parent_id IS NOT NULL
        )
        SELECT 1 FROM up
        JOIN selections s ON s.id = up.id
        JOIN type_fields tf ON tf.id = s.type
        WHERE tf.type_modifiers LIKE '%]%'
        LIMIT 1
        "#,
        rusqlite::params![selection, document],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(!found.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::{compile_until_discovered, SCHEMA};

    /// Load, discover, then run one rule
    pub fn check(rule: Rule, documents: &[&str]) -> Diagnostics {
        check_with(rule, documents, &ProjectConfig::default())
    }

    pub fn check_with(rule: Rule, documents: &[&str], config: &ProjectConfig) -> Diagnostics {
        let (store, diagnostics) = compile_until_discovered(SCHEMA, documents, config);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let conn = store.connection().unwrap();
        rule(&*conn, config).unwrap()
    }

    #[test]
    fn test_rules_run_concurrently() {
        let config = ProjectConfig::default();
        let (store, _) = compile_until_discovered(
            SCHEMA,
            &[
                "query A { user { id @required } }",
                "query A { user { firstName } }",
            ],
            &config,
        );
        let cancel = CancellationToken::new();
        assert!(run_discovery_sweeps(&store, &config, &cancel).unwrap().is_empty());
        let diagnostics = run_rules(&store, &config, &cancel).unwrap();
        // The non-null @required field and the duplicate name
        assert_eq!(diagnostics.len(), 2, "{}", diagnostics);
    }

    #[test]
    fn test_under_list() {
        let (store, _) = compile_until_discovered(
            SCHEMA,
            &["query Q { users { friends { edges { node { id } } } } user { friends { pageInfo { endCursor } } } }"],
            &ProjectConfig::default(),
        );
        let conn = store.connection().unwrap();
        let rows = ir::query_all(
            &conn,
            "SELECT r.child_id, r.document FROM selection_refs r JOIN selections s ON s.id = r.child_id WHERE s.field_name = 'friends' ORDER BY r.id",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .unwrap();
        assert!(under_list(&conn, rows[0].0, rows[0].1).unwrap());
        assert!(!under_list(&conn, rows[1].0, rows[1].1).unwrap());
    }
}
