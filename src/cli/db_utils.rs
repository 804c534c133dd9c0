//! Database path and input file utilities

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::db::Store;
use crate::types::RawDocument;

/// Open the store a compile writes into
///
/// Without a path the IR lives in memory. A file database is recreated
/// from scratch since every compile starts from an empty IR.
pub fn open_store(db_path: Option<&Path>, workers: usize) -> Result<Store> {
    let Some(path) = db_path else {
        return Store::in_memory();
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
    }
    for file in database_files(path) {
        if file.exists() {
            std::fs::remove_file(&file)
                .with_context(|| format!("Could not remove {}", file.display()))?;
        }
    }
    Store::open(path, workers)
}

/// The database file and its WAL companions
fn database_files(path: &Path) -> Vec<PathBuf> {
    let name = path.display().to_string();
    vec![
        path.to_path_buf(),
        PathBuf::from(format!("{}-wal", name)),
        PathBuf::from(format!("{}-shm", name)),
    ]
}

/// Read a file into a string, naming it in the error
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
}

/// Read every document file as one raw document
pub fn read_documents(paths: &[PathBuf]) -> Result<Vec<RawDocument>> {
    paths
        .iter()
        .map(|path| Ok(RawDocument::new(path.display().to_string(), read_file(path)?)))
        .collect()
}
