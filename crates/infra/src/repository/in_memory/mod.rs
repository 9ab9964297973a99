//! In-memory repositories for tests and local development.
//!
//! They honour the same contracts as the Postgres ones: versioned saves,
//! delete policies and sealed-token pagination. Not optimized for size.

mod appointment;
mod directory;
mod organization;

pub use appointment::InMemoryAppointmentRepository;
pub use directory::InMemoryDirectory;
pub use organization::InMemoryOrganizationRepository;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bookings_core::{ExpectedVersion, RepositoryError};

/// Stored row carrying its optimistic-concurrency version.
pub(crate) trait Versioned {
    fn stored_version(&self) -> u64;
}

/// Keyed rows behind a lock, with version-checked writes.
#[derive(Debug)]
pub(crate) struct Table<K, R> {
    rows: RwLock<HashMap<K, R>>,
}

impl<K, R> Default for Table<K, R> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, R> Table<K, R>
where
    K: Eq + Hash + Clone,
    R: Versioned + Clone,
{
    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<K, R>>, RepositoryError> {
        self.rows
            .read()
            .map_err(|_| RepositoryError::storage("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<K, R>>, RepositoryError> {
        self.rows
            .write()
            .map_err(|_| RepositoryError::storage("lock poisoned"))
    }

    pub(crate) fn get(&self, key: &K) -> Result<Option<R>, RepositoryError> {
        Ok(self.read()?.get(key).cloned())
    }

    pub(crate) fn snapshot(&self) -> Result<Vec<R>, RepositoryError> {
        Ok(self.read()?.values().cloned().collect())
    }

    pub(crate) fn any(&self, predicate: impl Fn(&R) -> bool) -> Result<bool, RepositoryError> {
        Ok(self.read()?.values().any(predicate))
    }

    /// Insert or replace `record` if the stored version matches `expected`.
    pub(crate) fn put(&self, key: K, expected: ExpectedVersion, record: R) -> Result<(), RepositoryError> {
        let mut rows = self.write()?;
        expected.check(rows.get(&key).map(Versioned::stored_version))?;
        rows.insert(key, record);
        Ok(())
    }

    /// Remove the row if the stored version matches `expected`.
    pub(crate) fn remove_checked(&self, key: &K, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut rows = self.write()?;
        expected.check(rows.get(key).map(Versioned::stored_version))?;
        rows.remove(key);
        Ok(())
    }

    pub(crate) fn remove(&self, key: &K) -> Result<(), RepositoryError> {
        self.write()?.remove(key);
        Ok(())
    }
}
