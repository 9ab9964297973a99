//! Aggregate root contract and optimistic concurrency expectations.

use crate::audit::{Auditable, Audited};
use crate::error::RepositoryError;

/// Aggregate root: identity, audit metadata and a buffer of pending events.
///
/// Mutations happen through the aggregate's own methods; each successful one
/// records exactly one audit update and buffers exactly one event. Services
/// drain the buffer with `pull_events` after persisting.
pub trait AggregateRoot: Audited {
    /// Aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync;

    /// Event type buffered by this aggregate.
    type Event: Clone + core::fmt::Debug + Send;

    fn id(&self) -> &Self::Id;

    /// Drain pending events in emission order. A second call returns nothing.
    fn pull_events(&mut self) -> Vec<Self::Event>;

    /// Record that the current version has been persisted.
    fn mark_persisted(&mut self);
}

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (key-based deletes).
    Any,
    /// The record must not exist yet.
    NoRecord,
    /// The stored record must be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation implied by an aggregate's audit block.
    pub fn for_save(audit: &Auditable) -> Self {
        match audit.committed_version() {
            None => ExpectedVersion::NoRecord,
            Some(v) => ExpectedVersion::Exact(v),
        }
    }

    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::NoRecord, None) => true,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            _ => false,
        }
    }

    pub fn check(self, actual: Option<u64>) -> Result<(), RepositoryError> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(RepositoryError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Actor;

    #[test]
    fn new_audit_expects_no_record() {
        let audit = Auditable::new(&Actor::new("u"));
        let expected = ExpectedVersion::for_save(&audit);

        assert_eq!(expected, ExpectedVersion::NoRecord);
        assert!(expected.matches(None));
        assert!(expected.check(Some(0)).is_err());
    }

    #[test]
    fn exact_rejects_moved_version() {
        let err = ExpectedVersion::Exact(2).check(Some(3)).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(ExpectedVersion::Exact(2).check(None).is_err());
        assert!(ExpectedVersion::Any.check(Some(9)).is_ok());
    }
}
