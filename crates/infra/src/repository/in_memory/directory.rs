use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use bookings_core::{BatchReadRepository, Entity, ReadRepository, RepositoryError};
use bookings_directory::ReferenceEntity;

/// Reference entities kept in a process-local map.
#[derive(Debug)]
pub struct InMemoryDirectory<V: ReferenceEntity> {
    rows: RwLock<HashMap<V::Id, V>>,
}

impl<V: ReferenceEntity> Default for InMemoryDirectory<V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: ReferenceEntity> InMemoryDirectory<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entities: impl IntoIterator<Item = V>) -> Self {
        let directory = Self::new();
        if let Ok(mut rows) = directory.rows.write() {
            rows.extend(entities.into_iter().map(|e| (e.id().clone(), e)));
        }
        directory
    }

    pub fn insert(&self, entity: V) -> Result<(), RepositoryError> {
        self.rows
            .write()
            .map_err(|_| RepositoryError::storage("lock poisoned"))?
            .insert(entity.id().clone(), entity);
        Ok(())
    }
}

#[async_trait]
impl<V: ReferenceEntity> ReadRepository<V::Id, V> for InMemoryDirectory<V> {
    async fn find_by_key(&self, key: &V::Id) -> Result<Option<V>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::storage("lock poisoned"))?;
        Ok(rows.get(key).cloned())
    }
}

#[async_trait]
impl<V: ReferenceEntity> BatchReadRepository<V::Id, V> for InMemoryDirectory<V> {
    async fn find_all_by_keys(&self, keys: &[V::Id]) -> Result<Vec<V>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::storage("lock poisoned"))?;
        Ok(keys.iter().filter_map(|k| rows.get(k).cloned()).collect())
    }
}
