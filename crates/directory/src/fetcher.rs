//! Read services over reference data.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use bookings_core::{BatchReadRepository, DomainError, Entity, ReadRepository, ServiceResult};

/// Reference entity with a resource name used in not-found errors.
pub trait ReferenceEntity:
    Entity<Id: Send + Sync + core::fmt::Display> + Clone + Send + Sync + 'static
{
    const RESOURCE: &'static str;
}

/// Single and batch lookups of reference entities.
#[async_trait]
pub trait Fetcher<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    /// `NotFound` when the key does not exist.
    async fn get_by_key(&self, key: &K) -> ServiceResult<V>;

    /// Entities for the existing keys; duplicates are fetched once and unknown
    /// keys are skipped.
    async fn list_by_keys(&self, keys: &[K]) -> ServiceResult<Vec<V>>;
}

/// `Fetcher` over a local batch read repository.
pub struct LocalFetcher<V: ReferenceEntity> {
    repository: Arc<dyn BatchReadRepository<V::Id, V>>,
    _entity: PhantomData<fn() -> V>,
}

impl<V: ReferenceEntity> LocalFetcher<V> {
    pub fn new(repository: Arc<dyn BatchReadRepository<V::Id, V>>) -> Self {
        Self {
            repository,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<V: ReferenceEntity> Fetcher<V::Id, V> for LocalFetcher<V> {
    #[instrument(skip(self, key), fields(resource = V::RESOURCE, key = %key), err)]
    async fn get_by_key(&self, key: &V::Id) -> ServiceResult<V> {
        self.repository
            .find_by_key(key)
            .await?
            .ok_or_else(|| DomainError::not_found(V::RESOURCE).into())
    }

    #[instrument(skip(self, keys), fields(resource = V::RESOURCE, requested = keys.len()), err)]
    async fn list_by_keys(&self, keys: &[V::Id]) -> ServiceResult<Vec<V>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique: Vec<V::Id> = keys
            .iter()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.repository.find_all_by_keys(&unique).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookings_core::{EmployeeId, RepositoryError};
    use chrono::Utc;
    use std::sync::Mutex;

    use crate::employee::Employee;

    #[derive(Default)]
    struct FakeEmployees {
        rows: Vec<Employee>,
        batch_calls: Mutex<Vec<Vec<EmployeeId>>>,
    }

    #[async_trait]
    impl ReadRepository<EmployeeId, Employee> for FakeEmployees {
        async fn find_by_key(&self, key: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
            Ok(self.rows.iter().find(|e| e.id() == key).cloned())
        }
    }

    #[async_trait]
    impl BatchReadRepository<EmployeeId, Employee> for FakeEmployees {
        async fn find_all_by_keys(&self, keys: &[EmployeeId]) -> Result<Vec<Employee>, RepositoryError> {
            self.batch_calls.lock().unwrap().push(keys.to_vec());
            Ok(self
                .rows
                .iter()
                .filter(|e| keys.contains(e.id()))
                .cloned()
                .collect())
        }
    }

    fn employee(id: &str) -> Employee {
        Employee::new(EmployeeId::new(id).unwrap(), format!("Employee {id}"), Utc::now())
    }

    fn fetcher(rows: Vec<Employee>) -> (Arc<FakeEmployees>, LocalFetcher<Employee>) {
        let repo = Arc::new(FakeEmployees {
            rows,
            ..Default::default()
        });
        (repo.clone(), LocalFetcher::new(repo))
    }

    #[tokio::test]
    async fn get_by_key_reports_not_found() {
        let (_, fetcher) = fetcher(vec![employee("e-1")]);

        let found = fetcher.get_by_key(&EmployeeId::new("e-1").unwrap()).await.unwrap();
        assert_eq!(found.full_name(), "Employee e-1");

        let err = fetcher
            .get_by_key(&EmployeeId::new("e-9").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_by_keys_deduplicates_and_skips_unknown() {
        let (repo, fetcher) = fetcher(vec![employee("e-1"), employee("e-2")]);
        let keys = ["e-1", "e-1", "e-2", "e-3"].map(|k| EmployeeId::new(k).unwrap());

        let found = fetcher.list_by_keys(&keys).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(repo.batch_calls.lock().unwrap()[0].len(), 3);
    }

    #[tokio::test]
    async fn list_by_no_keys_skips_repository() {
        let (repo, fetcher) = fetcher(vec![employee("e-1")]);

        assert!(fetcher.list_by_keys(&[]).await.unwrap().is_empty());
        assert!(repo.batch_calls.lock().unwrap().is_empty());
    }
}
