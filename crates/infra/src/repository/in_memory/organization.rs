use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookings_core::{
    AggregateRoot, Audited, DeletePolicy, ExpectedVersion, FilterValue, OrganizationId, Page,
    PagedReadRepository, ReadRepository, RepositoryError, WriteRepository,
};
use bookings_organization::repository::fields;
use bookings_organization::{
    ListOrganizations, Organization, OrganizationRecord, OrganizationRepository,
};

use super::{Table, Versioned};
use crate::paging::{InMemorySource, Paginator, Queryable};

impl Versioned for OrganizationRecord {
    fn stored_version(&self) -> u64 {
        self.audit.version
    }
}

impl Queryable for OrganizationRecord {
    fn row_id(&self) -> String {
        self.id.to_string()
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            fields::ORGANIZATION_ID => Some(self.id.as_str().into()),
            fields::NAME => Some(self.name.as_str().into()),
            fields::IS_DELETED => Some(self.audit.is_deleted.into()),
            _ => None,
        }
    }

    fn sort_key(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            fields::CREATE_TIME => Some(self.audit.create_time),
            _ => None,
        }
    }
}

/// Organizations kept in a process-local map.
#[derive(Debug)]
pub struct InMemoryOrganizationRepository {
    table: Table<OrganizationId, OrganizationRecord>,
    delete_policy: DeletePolicy,
    paginator: Paginator,
}

impl InMemoryOrganizationRepository {
    pub fn new(paginator: Paginator) -> Self {
        Self {
            table: Table::default(),
            delete_policy: DeletePolicy::default(),
            paginator,
        }
    }

    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    /// Stored row, soft-deleted or not.
    pub fn raw(&self, id: &OrganizationId) -> Result<Option<OrganizationRecord>, RepositoryError> {
        self.table.get(id)
    }

    fn live(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        Ok(self
            .table
            .get(id)?
            .filter(|r| !r.audit.is_deleted)
            .map(Organization::restore))
    }
}

#[async_trait]
impl WriteRepository<Organization> for InMemoryOrganizationRepository {
    async fn save(&self, entity: &Organization) -> Result<(), RepositoryError> {
        self.table.put(
            entity.id().clone(),
            ExpectedVersion::for_save(entity.auditable()),
            entity.to_record(),
        )
    }

    async fn find_by_key(&self, key: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.live(key)
    }

    async fn delete(&self, entity: &Organization) -> Result<(), RepositoryError> {
        let expected = ExpectedVersion::for_save(entity.auditable());
        match self.delete_policy {
            DeletePolicy::Soft => self.table.put(entity.id().clone(), expected, entity.to_record()),
            DeletePolicy::Hard => self.table.remove_checked(entity.id(), expected),
        }
    }

    async fn delete_by_key(&self, key: &OrganizationId) -> Result<(), RepositoryError> {
        self.table.remove(key)
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        self.table.any(|r| !r.audit.is_deleted && r.name == name)
    }
}

#[async_trait]
impl ReadRepository<OrganizationId, Organization> for InMemoryOrganizationRepository {
    async fn find_by_key(&self, key: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.live(key)
    }
}

#[async_trait]
impl PagedReadRepository<OrganizationId, Organization> for InMemoryOrganizationRepository {
    type Criteria = ListOrganizations;

    async fn find_all(&self, criteria: ListOrganizations) -> Result<Option<Page<Organization>>, RepositoryError> {
        let source = InMemorySource::new(self.table.snapshot()?);
        let page = self
            .paginator
            .paginate(&source, &criteria.to_page_request())
            .await?;
        Ok(page.map(|p| p.map(Organization::restore)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bookings_core::Actor;

    use crate::paging::PageTokenCipher;

    fn repo() -> InMemoryOrganizationRepository {
        InMemoryOrganizationRepository::new(Paginator::new(Arc::new(PageTokenCipher::generate())))
    }

    fn org(id: &str, name: &str) -> Organization {
        Organization::new(OrganizationId::new(id).unwrap(), name, &Actor::new("u"))
    }

    #[tokio::test]
    async fn save_then_stale_save_conflicts() {
        let repo = repo();
        let mut original = org("o-1", "Acme");
        WriteRepository::save(&repo, &original).await.unwrap();
        original.mark_persisted();

        let id = OrganizationId::new("o-1").unwrap();
        let mut first = WriteRepository::find_by_key(&repo, &id).await.unwrap().unwrap();
        let mut second = WriteRepository::find_by_key(&repo, &id).await.unwrap().unwrap();

        first.update(&Actor::new("a"), bookings_organization::OrganizationUpdate::new().with_name("A"));
        second.update(&Actor::new("b"), bookings_organization::OrganizationUpdate::new().with_name("B"));

        WriteRepository::save(&repo, &first).await.unwrap();
        let err = WriteRepository::save(&repo, &second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = repo.raw(&id).unwrap().unwrap();
        assert_eq!(stored.name, "A");
        assert_eq!(stored.audit.version, 1);
    }

    #[tokio::test]
    async fn inserting_twice_conflicts() {
        let repo = repo();
        WriteRepository::save(&repo, &org("o-1", "Acme")).await.unwrap();

        let err = WriteRepository::save(&repo, &org("o-1", "Other")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_delete_hides_row_and_frees_name() {
        let repo = repo();
        let mut org = org("o-1", "Acme");
        WriteRepository::save(&repo, &org).await.unwrap();
        org.mark_persisted();

        org.delete(&Actor::new("u"));
        WriteRepository::delete(&repo, &org).await.unwrap();

        let id = OrganizationId::new("o-1").unwrap();
        assert!(WriteRepository::find_by_key(&repo, &id).await.unwrap().is_none());
        assert!(repo.raw(&id).unwrap().unwrap().audit.is_deleted);
        assert!(!repo.exists_by_name("Acme").await.unwrap());
    }

    #[tokio::test]
    async fn hard_delete_removes_row() {
        let repo = repo().with_delete_policy(DeletePolicy::Hard);
        let mut org = org("o-1", "Acme");
        WriteRepository::save(&repo, &org).await.unwrap();
        org.mark_persisted();

        org.delete(&Actor::new("u"));
        WriteRepository::delete(&repo, &org).await.unwrap();

        assert!(repo.raw(&OrganizationId::new("o-1").unwrap()).unwrap().is_none());
    }
}
