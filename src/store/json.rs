use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::{MappingData, MappingStore, StoreError, Table};
use crate::model::project::Namespace;

/// Mapping store persisted as a single pretty-printed JSON document.
///
/// The whole document is rewritten on every `set`, while the write lock is
/// held, so concurrent writers never interleave partial files.
pub struct JsonMappingStore {
    path: PathBuf,
    data: RwLock<MappingData>,
}

impl JsonMappingStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => MappingData::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MappingData::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "opened mapping store");
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    async fn save(&self, data: &MappingData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl MappingStore for JsonMappingStore {
    async fn get(&self, ns: &Namespace, table: Table, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.data.read().await.get(ns, table, key))
    }

    async fn set(
        &self,
        ns: &Namespace,
        table: Table,
        key: &str,
        value: u64,
    ) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        data.set(ns, table, key, value);
        self.save(&data).await
    }

    async fn entries(&self, ns: &Namespace, table: Table) -> Result<Vec<(String, u64)>, StoreError> {
        Ok(self.data.read().await.entries(ns, table))
    }
}
