//! Durable key/value mappings between source and destination objects.
//!
//! Every entry is scoped to a [`Namespace`] and lives in one of three tables:
//! source milestone id -> destination milestone id, destination issue iid ->
//! source issue iid, and `<source iid>:<assignee id>` -> destination issue
//! iid. Entries are never deleted.

mod json;
#[cfg(test)]
mod memory;

pub use json::JsonMappingStore;
#[cfg(test)]
pub use memory::MemoryMappingStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::model::project::Namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Milestones,
    Issues,
    /// Which recipients of a source issue already have their copy.
    Recipients,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("mapping store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn get(&self, ns: &Namespace, table: Table, key: &str) -> Result<Option<u64>, StoreError>;
    async fn set(&self, ns: &Namespace, table: Table, key: &str, value: u64)
        -> Result<(), StoreError>;
    async fn entries(&self, ns: &Namespace, table: Table) -> Result<Vec<(String, u64)>, StoreError>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct NamespaceTables {
    #[serde(default)]
    milestones: BTreeMap<String, u64>,
    #[serde(default)]
    issues: BTreeMap<String, u64>,
    #[serde(default)]
    recipients: BTreeMap<String, u64>,
}

impl NamespaceTables {
    fn table(&self, table: Table) -> &BTreeMap<String, u64> {
        match table {
            Table::Milestones => &self.milestones,
            Table::Issues => &self.issues,
            Table::Recipients => &self.recipients,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut BTreeMap<String, u64> {
        match table {
            Table::Milestones => &mut self.milestones,
            Table::Issues => &mut self.issues,
            Table::Recipients => &mut self.recipients,
        }
    }
}

/// Shared document layout: `{ "<src>:<dest>": { "milestones": {..}, "issues": {..}, "recipients": {..} } }`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct MappingData {
    namespaces: HashMap<String, NamespaceTables>,
}

impl MappingData {
    fn get(&self, ns: &Namespace, table: Table, key: &str) -> Option<u64> {
        self.namespaces
            .get(&ns.key())
            .and_then(|t| t.table(table).get(key).copied())
    }

    fn set(&mut self, ns: &Namespace, table: Table, key: &str, value: u64) {
        self.namespaces
            .entry(ns.key())
            .or_default()
            .table_mut(table)
            .insert(key.to_string(), value);
    }

    fn entries(&self, ns: &Namespace, table: Table) -> Vec<(String, u64)> {
        self.namespaces
            .get(&ns.key())
            .map(|t| {
                t.table(table)
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect()
            })
            .unwrap_or_default()
    }
}
