//! gqlc: GraphQL client document compiler
//!
//! Loads a GraphQL schema and the client documents of a project into a
//! relational IR stored in SQLite, validates them, and rewrites them into
//! the documents a normalized-cache runtime needs.
//!
//! ## Pipeline
//!
//! - Schema writer: user SDL plus the framework's internal directives
//! - Loader: parses raw documents into documents, selections and values
//! - Runtime scalars, component fields and list discovery
//! - Validation suite
//! - Pagination arguments, list operation fragments, component field
//!   spreads and fragment argument inlining
//!
//! Every stage is a public function taking a connection (or the [`Store`]
//! for pooled stages), so each one can be driven on its own. [`Compiler`]
//! runs them in order.

pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod diagnostics;
pub mod hash;
pub mod loader;
pub mod passes;
pub mod printer;
pub mod schema;
pub mod types;
pub mod validate;
pub mod values;
pub mod worker;

#[cfg(test)]
mod testing;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use config::ProjectConfig;
use db::Store;
use diagnostics::Diagnostics;
use types::{CompileStats, RawDocument};

/// What a compile produced
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub diagnostics: Diagnostics,
    pub stats: CompileStats,
}

/// Runs every stage against one store
pub struct Compiler {
    store: Store,
    config: ProjectConfig,
    cancel: CancellationToken,
}

impl Compiler {
    pub fn new(store: Store, config: ProjectConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the compile between stages and between documents
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    fn width(&self) -> usize {
        self.config.worker_count().min(self.store.width()).max(1)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            bail!("compile cancelled");
        }
        Ok(())
    }

    /// Compile `raw_documents` against `schema`
    ///
    /// The rewriting stages only run when loading and validation reported no
    /// errors; the diagnostics are returned either way.
    pub fn compile(&self, schema: &str, raw_documents: &[RawDocument]) -> Result<CompileOutput> {
        let store = &self.store;
        let config = &self.config;
        let width = self.width();
        let mut diagnostics = Diagnostics::new();

        store.write_config(config)?;
        store.with_transaction(|tx| schema::load_schema(tx, schema))?;
        store.insert_raw_documents(raw_documents)?;
        self.check_cancelled()?;

        diagnostics.extend(loader::load_documents(store, width, &self.cancel)?);
        self.check_cancelled()?;

        store.with_transaction(|tx| passes::rewrite_runtime_scalars(tx, config))?;

        diagnostics.extend(store.with_transaction(|tx| passes::discover_component_fields(tx))?);
        diagnostics.extend(store.with_transaction(|tx| passes::discover_lists(tx, config))?);
        self.check_cancelled()?;

        diagnostics.extend(validate::run_discovery_sweeps(store, config, &self.cancel)?);
        self.check_cancelled()?;
        diagnostics.extend(validate::run_rules(store, config, &self.cancel)?);
        self.check_cancelled()?;

        let mut clones = 0;
        if diagnostics.has_errors() {
            info!(
                "Skipping document rewrites: {} diagnostics reported",
                diagnostics.len()
            );
        } else {
            let prepared = store.with_transaction(|tx| passes::prepare_pagination(tx, config))?;
            let generated = store.with_transaction(|tx| passes::generate_list_operations(tx))?;
            let spreads =
                store.with_transaction(|tx| passes::rewrite_component_field_spreads(tx))?;
            info!(
                "Prepared {} paginated lists, generated {} list operations, rewrote {} component field spreads",
                prepared, generated, spreads
            );
            self.check_cancelled()?;

            let inlined = passes::inline_fragment_arguments(store, width, &self.cancel)?;
            clones = inlined.clones;
            diagnostics.extend(inlined.diagnostics);
        }

        let mut stats = store.get_stats()?;
        stats.fragment_clones = clones as u64;
        info!(
            "Compiled {} documents ({} selections, {} lists, {} fragment clones)",
            stats.documents, stats.selections, stats.lists, stats.fragment_clones
        );

        Ok(CompileOutput { diagnostics, stats })
    }
}
