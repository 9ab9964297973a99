//! Organization application services.
//!
//! Write services load through the write repository, mutate the aggregate,
//! save, then publish the drained events. Publication happens after the save:
//! with a direct publisher a failure there leaves the change persisted but
//! unannounced; with the outbox publisher delivery is at-least-once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use bookings_core::{
    Actor, AggregateRoot, DomainError, IdFactory, OrganizationId, Page, PagedReadRepository,
    ReadRepository, RepositoryError, ServiceResult, WriteRepository,
};
use bookings_events::{EventPublisher, publish_events};

use crate::organization::{Organization, OrganizationUpdate};
use crate::repository::{ListOrganizations, OrganizationReadRepository, OrganizationRepository};

const RESOURCE: &str = "organization";

/// Arguments to register an organization. Without an id one is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOrganization {
    pub id: Option<OrganizationId>,
    pub name: String,
}

/// Administrative operations on organizations.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Fails with `AlreadyExists` when the name or id is taken, including
    /// when a concurrent registration wins the insert.
    async fn register(&self, actor: &Actor, args: RegisterOrganization) -> ServiceResult<Organization>;

    /// Returns `None` when `update` carries no fields (nothing is loaded or saved).
    async fn modify_by_id(
        &self,
        actor: &Actor,
        id: &OrganizationId,
        update: OrganizationUpdate,
    ) -> ServiceResult<Option<Organization>>;

    /// Deleting a missing organization is a no-op.
    async fn delete_by_id(&self, actor: &Actor, id: &OrganizationId) -> ServiceResult<()>;
}

/// Single organization lookups.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_by_id(&self, id: &OrganizationId) -> ServiceResult<Organization>;
}

/// Paged organization listings.
#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(&self, criteria: ListOrganizations) -> ServiceResult<Page<Organization>>;
}

/// `Manager` backed by local repositories.
pub struct LocalManager {
    repository: Arc<dyn OrganizationRepository>,
    publisher: Arc<dyn EventPublisher>,
    ids: Arc<dyn IdFactory>,
}

impl LocalManager {
    pub fn new(
        repository: Arc<dyn OrganizationRepository>,
        publisher: Arc<dyn EventPublisher>,
        ids: Arc<dyn IdFactory>,
    ) -> Self {
        Self {
            repository,
            publisher,
            ids,
        }
    }

    async fn ensure_name_available(&self, name: &str) -> ServiceResult<()> {
        if self.repository.exists_by_name(name).await? {
            return Err(DomainError::already_exists(RESOURCE).into());
        }
        Ok(())
    }

    async fn load(&self, id: &OrganizationId) -> ServiceResult<Option<Organization>> {
        Ok(self.repository.find_by_key(id).await?)
    }

    async fn publish(&self, org: &mut Organization) -> ServiceResult<()> {
        publish_events(self.publisher.as_ref(), org.pull_events()).await?;
        Ok(())
    }
}

#[async_trait]
impl Manager for LocalManager {
    #[instrument(skip(self, actor, args), fields(actor = %actor, name = %args.name), err)]
    async fn register(&self, actor: &Actor, args: RegisterOrganization) -> ServiceResult<Organization> {
        self.ensure_name_available(&args.name).await?;

        let id = match args.id {
            Some(id) => id,
            None => OrganizationId::generate(self.ids.as_ref())?,
        };
        let mut org = Organization::new(id, args.name, actor);
        // An insert conflict means a concurrent registration took the id or
        // the name between the check above and this write.
        match self.repository.save(&org).await {
            Err(RepositoryError::Conflict(_)) => return Err(DomainError::already_exists(RESOURCE).into()),
            result => result?,
        }
        org.mark_persisted();
        tracing::info!(organization_id = %org.id(), "organization registered");

        self.publish(&mut org).await?;
        Ok(org)
    }

    #[instrument(skip(self, actor, id, update), fields(actor = %actor, organization_id = %id), err)]
    async fn modify_by_id(
        &self,
        actor: &Actor,
        id: &OrganizationId,
        update: OrganizationUpdate,
    ) -> ServiceResult<Option<Organization>> {
        if update.is_empty() {
            return Ok(None);
        }

        let mut org = self
            .load(id)
            .await?
            .ok_or(DomainError::not_found(RESOURCE))?;

        if let Some(name) = update.name.as_deref() {
            if name != org.name() {
                self.ensure_name_available(name).await?;
            }
        }

        org.update(actor, update);
        self.repository.save(&org).await?;
        org.mark_persisted();

        self.publish(&mut org).await?;
        Ok(Some(org))
    }

    #[instrument(skip(self, actor, id), fields(actor = %actor, organization_id = %id), err)]
    async fn delete_by_id(&self, actor: &Actor, id: &OrganizationId) -> ServiceResult<()> {
        let Some(mut org) = self.load(id).await? else {
            return Ok(());
        };

        org.delete(actor);
        self.repository.delete(&org).await?;
        org.mark_persisted();
        tracing::info!(organization_id = %id, "organization deleted");

        self.publish(&mut org).await
    }
}

/// `Fetcher` backed by a read repository.
pub struct LocalFetcher {
    repository: Arc<dyn OrganizationReadRepository>,
}

impl LocalFetcher {
    pub fn new(repository: Arc<dyn OrganizationReadRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Fetcher for LocalFetcher {
    #[instrument(skip(self, id), fields(organization_id = %id), err)]
    async fn get_by_id(&self, id: &OrganizationId) -> ServiceResult<Organization> {
        self.repository
            .find_by_key(id)
            .await?
            .ok_or_else(|| DomainError::not_found(RESOURCE).into())
    }
}

/// `Lister` backed by a read repository.
pub struct LocalLister {
    repository: Arc<dyn OrganizationReadRepository>,
}

impl LocalLister {
    pub fn new(repository: Arc<dyn OrganizationReadRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Lister for LocalLister {
    #[instrument(skip(self), err)]
    async fn list(&self, criteria: ListOrganizations) -> ServiceResult<Page<Organization>> {
        Ok(self.repository.find_all(criteria).await?.unwrap_or_default())
    }
}
