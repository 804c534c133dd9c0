//! Database module for gqlc
//!
//! Handles SQLite storage for the IR including:
//! - Schema creation
//! - The connection pool and transactions
//! - Project configuration and raw document storage
//! - Shared statements for the passes (see [`ir`])

pub mod ir;
mod pool;
mod schema;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::config::ProjectConfig;
use crate::types::{CompileStats, RawDocument};

pub use pool::{ConnectionPool, PooledConnection, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the IR store
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Open or create a database at the given path with a pool of
    /// `connections` connections
    pub fn open<P: AsRef<Path>>(path: P, connections: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut pool = Vec::with_capacity(connections.max(1));
        for _ in 0..connections.max(1) {
            let conn = Connection::open(path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", true)?;
            pool.push(conn);
        }
        pool[0].execute_batch(schema::SCHEMA)?;
        Ok(Self {
            pool: ConnectionPool::new(pool),
        })
    }

    /// Create an in-memory database (for testing). An in-memory database is
    /// private to its connection, so the pool holds exactly one.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            pool: ConnectionPool::new(vec![conn]),
        })
    }

    /// Check out a connection for one unit of work
    ///
    /// Fails with [`StoreError::CheckoutTimeout`] rather than waiting
    /// forever, so a caller that already holds the only connection of an
    /// in-memory store finds out.
    pub fn connection(&self) -> Result<PooledConnection<'_>> {
        Ok(self.pool.get()?)
    }

    /// Number of pooled connections
    pub fn width(&self) -> usize {
        self.pool.size()
    }

    /// Run `f` inside a write transaction, committing on success
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.connection()?;
        transaction(&mut conn, f)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Store the key configuration the SQL rules join against
    pub fn write_config(&self, config: &ProjectConfig) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute(
                r#"
                INSERT INTO config (id, default_keys) VALUES (1, ?1)
                ON CONFLICT(id) DO UPDATE SET default_keys = excluded.default_keys
                "#,
                params![serde_json::to_string(&config.default_keys)?],
            )?;
            tx.execute("DELETE FROM type_configs", [])?;
            let mut stmt = tx.prepare(
                "INSERT INTO type_configs (name, keys, resolve_query) VALUES (?1, ?2, ?3)",
            )?;
            for (name, type_config) in &config.types {
                let keys = type_config
                    .keys
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![name, keys, type_config.resolve_query])?;
            }
            Ok(())
        })
    }

    // =========================================================================
    // Raw Documents
    // =========================================================================

    /// Insert raw documents and return their ids
    pub fn insert_raw_documents(&self, documents: &[RawDocument]) -> Result<Vec<i64>> {
        self.with_transaction(|tx| {
            let mut ids = Vec::with_capacity(documents.len());
            for document in documents {
                ids.push(insert_raw_document(tx, document)?);
            }
            Ok(ids)
        })
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Count what the compile produced
    pub fn get_stats(&self) -> Result<CompileStats> {
        let conn = self.connection()?;
        let count = |sql: &str| -> Result<u64> {
            Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as u64)
        };
        Ok(CompileStats {
            raw_documents: count("SELECT COUNT(*) FROM raw_documents")?,
            documents: count("SELECT COUNT(*) FROM documents")?,
            selections: count("SELECT COUNT(*) FROM selections")?,
            lists: count("SELECT COUNT(*) FROM discovered_lists")?,
            fragment_clones: 0,
        })
    }
}

/// Run `f` inside an IMMEDIATE transaction on `conn`. The store has a single
/// writer, so taking the write lock up front avoids upgrade deadlocks.
pub fn transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Insert a raw document and return its id
pub fn insert_raw_document(conn: &Connection, document: &RawDocument) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO raw_documents (
            filepath, content, offset_line, offset_column,
            inline_component_field, inline_component_field_prop
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            document.filepath,
            document.content,
            document.offset_line as i64,
            document.offset_column as i64,
            document.inline_component_field,
            document.inline_component_field_prop,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A raw document as stored
#[derive(Debug, Clone)]
pub struct StoredRawDocument {
    pub id: i64,
    pub document: RawDocument,
}

/// Every raw document, in insertion order
pub fn raw_documents(conn: &Connection) -> Result<Vec<StoredRawDocument>> {
    ir::query_all(
        conn,
        r#"
        SELECT id, filepath, content, offset_line, offset_column,
               inline_component_field, inline_component_field_prop
        FROM raw_documents ORDER BY id
        "#,
        [],
        |row| {
            Ok(StoredRawDocument {
                id: row.get(0)?,
                document: RawDocument {
                    filepath: row.get(1)?,
                    content: row.get(2)?,
                    offset_line: row.get::<_, i64>(3)? as u32,
                    offset_column: row.get::<_, i64>(4)? as u32,
                    inline_component_field: row.get(5)?,
                    inline_component_field_prop: row.get(6)?,
                },
            })
        },
    )
}
