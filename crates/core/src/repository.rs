//! Persistence contracts.
//!
//! Write repositories are the strongly consistent source of truth for
//! aggregates and enforce optimistic concurrency. Read repositories serve
//! listings and may lag behind writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::error::RepositoryError;
use crate::paging::Page;

/// How `WriteRepository::delete` treats the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Persist the tombstone (`is_deleted = true`) with a versioned update.
    #[default]
    Soft,
    /// Remove the row, still conditional on the committed version.
    Hard,
}

/// Strongly consistent store for an aggregate.
#[async_trait]
pub trait WriteRepository<E>: Send + Sync
where
    E: AggregateRoot + Send + Sync + 'static,
{
    /// Insert when the aggregate is new, otherwise update conditionally on
    /// its committed version. A version mismatch yields `Conflict`.
    ///
    /// The caller marks the aggregate persisted once this returns `Ok`.
    async fn save(&self, entity: &E) -> Result<(), RepositoryError>;

    async fn find_by_key(&self, key: &E::Id) -> Result<Option<E>, RepositoryError>;

    /// Delete a loaded aggregate according to the configured `DeletePolicy`.
    async fn delete(&self, entity: &E) -> Result<(), RepositoryError>;

    /// Remove by key without a version check. Missing keys are not an error.
    async fn delete_by_key(&self, key: &E::Id) -> Result<(), RepositoryError>;
}

/// Key lookup on a (possibly lagging) read side.
#[async_trait]
pub trait ReadRepository<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    async fn find_by_key(&self, key: &K) -> Result<Option<V>, RepositoryError>;
}

/// Read side with cursor-paginated listings.
#[async_trait]
pub trait PagedReadRepository<K, V>: ReadRepository<K, V>
where
    K: Send + Sync,
    V: Send,
{
    type Criteria: Send + Sync;

    /// `Ok(None)` means "no results" for a first page request. A request that
    /// carries a token and finds nothing returns an empty page instead.
    async fn find_all(&self, criteria: Self::Criteria) -> Result<Option<Page<V>>, RepositoryError>;
}

/// Batch lookup for reference data.
#[async_trait]
pub trait BatchReadRepository<K, V>: ReadRepository<K, V>
where
    K: Send + Sync,
    V: Send,
{
    /// Rows for the keys that exist; missing keys are skipped.
    async fn find_all_by_keys(&self, keys: &[K]) -> Result<Vec<V>, RepositoryError>;
}
