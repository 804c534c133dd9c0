//! Project configuration consumed by the compiler passes

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{ListTarget, PaginateMode};

/// Per-type overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeConfig {
    /// Fields that identify a record of this type
    pub keys: Option<Vec<String>>,
    /// Query used to refetch a record of this type by its keys
    pub resolve_query: Option<String>,
}

/// Configuration for a compile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// Runtime scalar name -> static scalar it is sent as
    pub runtime_scalars: BTreeMap<String, String>,
    pub default_paginate_mode: PaginateMode,
    pub default_list_target: ListTarget,
    pub suppress_pagination_deduplication: bool,
    /// Key fields used when a type has no override
    pub default_keys: Vec<String>,
    /// Type name -> overrides
    pub types: BTreeMap<String, TypeConfig>,
    /// Worker pool width for the loader and the fragment inliner
    pub workers: Option<usize>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            runtime_scalars: BTreeMap::new(),
            default_paginate_mode: PaginateMode::Infinite,
            default_list_target: ListTarget::Parent,
            suppress_pagination_deduplication: false,
            default_keys: vec!["id".to_string()],
            types: BTreeMap::new(),
            workers: None,
        }
    }
}

impl ProjectConfig {
    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid project configuration")
    }

    /// Read a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Key fields of a type, honoring per-type overrides
    pub fn keys(&self, type_name: &str) -> &[String] {
        self.types
            .get(type_name)
            .and_then(|t| t.keys.as_deref())
            .unwrap_or(&self.default_keys)
    }

    /// Number of workers for pooled passes
    pub fn worker_count(&self) -> usize {
        self.workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}
