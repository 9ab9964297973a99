//! Audit metadata carried by every persisted aggregate.
//!
//! `Auditable` records who created and last touched an aggregate, keeps the
//! optimistic-concurrency version counter and the soft-delete marker. Only the
//! owning aggregate mutates it, through its own operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Principal performing an operation (opaque user or system identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Actor used by background jobs and seeding.
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Actor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Audit fields as stored by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub create_time: DateTime<Utc>,
    pub create_by: Actor,
    pub last_update_time: DateTime<Utc>,
    pub last_update_by: Actor,
    pub version: u64,
    pub is_deleted: bool,
}

/// Creation/update/deletion metadata plus the version counter.
///
/// Invariants:
/// - `last_update_time >= create_time`
/// - `version` starts at 0 and grows by exactly 1 per recorded mutation
/// - `is_deleted` only ever goes from `false` to `true`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auditable {
    create_time: DateTime<Utc>,
    create_by: Actor,
    last_update_time: DateTime<Utc>,
    last_update_by: Actor,
    version: u64,
    is_deleted: bool,
    committed_version: Option<u64>,
}

impl Auditable {
    /// Fresh audit block for a brand-new aggregate.
    pub fn new(actor: &Actor) -> Self {
        let now = Utc::now();
        Self {
            create_time: now,
            create_by: actor.clone(),
            last_update_time: now,
            last_update_by: actor.clone(),
            version: 0,
            is_deleted: false,
            committed_version: None,
        }
    }

    /// Rehydrate from storage. The stored version becomes the committed version.
    pub fn restore(record: AuditRecord) -> Self {
        Self {
            create_time: record.create_time,
            create_by: record.create_by,
            last_update_time: record.last_update_time.max(record.create_time),
            last_update_by: record.last_update_by,
            version: record.version,
            is_deleted: record.is_deleted,
            committed_version: Some(record.version),
        }
    }

    pub fn record_update(&mut self, actor: &Actor) {
        // Clamp so a wall clock stepping backwards cannot break ordering.
        self.last_update_time = Utc::now().max(self.create_time);
        self.last_update_by = actor.clone();
        self.version += 1;
    }

    pub fn record_delete(&mut self, actor: &Actor) {
        self.record_update(actor);
        self.is_deleted = true;
    }

    /// Called once the current version has been written to the store.
    pub fn mark_committed(&mut self) {
        self.committed_version = Some(self.version);
    }

    /// True until the aggregate has been persisted once.
    pub fn is_new(&self) -> bool {
        self.committed_version.is_none()
    }

    /// Version the store is expected to hold (`None` for new aggregates).
    pub fn committed_version(&self) -> Option<u64> {
        self.committed_version
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    pub fn create_by(&self) -> &Actor {
        &self.create_by
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    pub fn last_update_by(&self) -> &Actor {
        &self.last_update_by
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Snapshot suitable for persisting.
    pub fn to_record(&self) -> AuditRecord {
        AuditRecord {
            create_time: self.create_time,
            create_by: self.create_by.clone(),
            last_update_time: self.last_update_time,
            last_update_by: self.last_update_by.clone(),
            version: self.version,
            is_deleted: self.is_deleted,
        }
    }
}

/// Capability for anything embedding an `Auditable`.
///
/// Implementors only provide `auditable()`; the accessors forward to it.
pub trait Audited {
    fn auditable(&self) -> &Auditable;

    fn version(&self) -> u64 {
        self.auditable().version()
    }

    fn is_new(&self) -> bool {
        self.auditable().is_new()
    }

    fn is_deleted(&self) -> bool {
        self.auditable().is_deleted()
    }

    fn create_time(&self) -> DateTime<Utc> {
        self.auditable().create_time()
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        self.auditable().last_update_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn actor() -> Actor {
        Actor::new("some-user")
    }

    #[test]
    fn new_audit_starts_at_version_zero() {
        let audit = Auditable::new(&actor());

        assert_eq!(audit.version(), 0);
        assert!(audit.is_new());
        assert!(!audit.is_deleted());
        assert_eq!(audit.create_by(), &actor());
        assert_eq!(audit.last_update_time(), audit.create_time());
    }

    #[test]
    fn record_update_bumps_version_and_actor() {
        let mut audit = Auditable::new(&actor());
        let other = Actor::new("other-user");

        audit.record_update(&other);

        assert_eq!(audit.version(), 1);
        assert_eq!(audit.last_update_by(), &other);
        assert_eq!(audit.create_by(), &actor());
        assert!(audit.last_update_time() >= audit.create_time());
    }

    #[test]
    fn record_delete_marks_deleted() {
        let mut audit = Auditable::new(&actor());
        audit.record_delete(&actor());

        assert!(audit.is_deleted());
        assert_eq!(audit.version(), 1);
    }

    #[test]
    fn restore_is_committed_at_stored_version() {
        let now = Utc::now();
        let mut audit = Auditable::restore(AuditRecord {
            create_time: now,
            create_by: actor(),
            last_update_time: now,
            last_update_by: actor(),
            version: 4,
            is_deleted: false,
        });

        assert!(!audit.is_new());
        assert_eq!(audit.committed_version(), Some(4));

        audit.record_update(&actor());
        assert_eq!(audit.committed_version(), Some(4));
        audit.mark_committed();
        assert_eq!(audit.committed_version(), Some(5));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn version_counts_every_mutation(updates in 0usize..50, delete in any::<bool>()) {
            let mut audit = Auditable::new(&actor());
            for _ in 0..updates {
                audit.record_update(&actor());
            }
            if delete {
                audit.record_delete(&actor());
            }

            let expected = updates as u64 + u64::from(delete);
            prop_assert_eq!(audit.version(), expected);
            prop_assert_eq!(audit.is_deleted(), delete);
            prop_assert!(audit.last_update_time() >= audit.create_time());
        }
    }
}
