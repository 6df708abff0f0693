use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MappingData, MappingStore, StoreError, Table};
use crate::model::project::Namespace;

/// Mapping store without persistence; lost when the process exits.
#[derive(Default)]
pub struct MemoryMappingStore {
    data: RwLock<MappingData>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
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
        self.data.write().await.set(ns, table, key, value);
        Ok(())
    }

    async fn entries(&self, ns: &Namespace, table: Table) -> Result<Vec<(String, u64)>, StoreError> {
        Ok(self.data.read().await.entries(ns, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::ProjectId;

    #[tokio::test]
    async fn tables_and_namespaces_are_isolated() {
        let store = MemoryMappingStore::new();
        let a = Namespace::new(ProjectId::new("1"), ProjectId::new("2"));
        let b = Namespace::new(ProjectId::new("1"), ProjectId::new("3"));

        store.set(&a, Table::Milestones, "10", 20).await.unwrap();

        assert_eq!(store.get(&a, Table::Milestones, "10").await.unwrap(), Some(20));
        assert_eq!(store.get(&a, Table::Issues, "10").await.unwrap(), None);
        assert_eq!(store.get(&b, Table::Milestones, "10").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_writes_to_distinct_keys_all_land() {
        let store = MemoryMappingStore::new();
        let ns = Namespace::new(ProjectId::new("1"), ProjectId::new("2"));

        let writes = (0..20u64).map(|i| {
            let store = &store;
            let ns = &ns;
            async move { store.set(ns, Table::Issues, &i.to_string(), i + 100).await }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(store.entries(&ns, Table::Issues).await.unwrap().len(), 20);
    }
}
