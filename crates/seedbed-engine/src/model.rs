use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// How record ids are generated when the caller does not supply one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Uuid,
    /// Integers starting at 1, per collection.
    Sequential,
}

/// When the persistence collaborator is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Never load or save.
    Off,
    /// Save the full record set after seeding and after each mutation.
    #[default]
    Snapshot,
    /// Save after seeding, then forward each mutation to the incremental hooks.
    Streaming,
}

/// Options for the collection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Seed for deterministic value synthesis and FK distribution.
    pub rng_seed: u64,
    /// Records seeded for definitions without a `seedCount`.
    pub default_seed_count: u64,
    /// Page size for queries without a `limit`.
    pub default_page_limit: u64,
    pub id_strategy: IdStrategy,
    /// Shuffle each FK pool once before round-robin assignment.
    pub shuffle_fk_pool: bool,
    pub persist_mode: PersistMode,
    /// Directory for JSON persistence; in-memory only when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            default_seed_count: 10,
            default_page_limit: seedbed_core::query::DEFAULT_PAGE_LIMIT,
            id_strategy: IdStrategy::Uuid,
            shuffle_fk_pool: true,
            persist_mode: PersistMode::Snapshot,
            data_dir: None,
        }
    }
}

impl EngineOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Where a collection's initial records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    Loaded,
    Synthesized,
}

/// Structured seeding issue; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedIssue {
    pub code: String,
    pub relation: String,
    pub message: String,
}

/// Summary of a collection's initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub collection: String,
    pub source: SeedSource,
    pub rows: u64,
    pub issues: Vec<SeedIssue>,
}

impl SeedReport {
    pub fn new(collection: impl Into<String>, source: SeedSource) -> Self {
        Self {
            collection: collection.into(),
            source,
            rows: 0,
            issues: Vec::new(),
        }
    }

    pub fn record_issue(&mut self, issue: SeedIssue) {
        self.issues.push(issue);
    }
}
