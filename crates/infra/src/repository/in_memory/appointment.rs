use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookings_appointment::repository::fields;
use bookings_appointment::{Appointment, AppointmentCriteria, AppointmentRecord, AppointmentSummary};
use bookings_core::{
    AggregateRoot, AppointmentId, Audited, DeletePolicy, ExpectedVersion, FilterValue, Page,
    PagedReadRepository, ReadRepository, RepositoryError, WriteRepository,
};

use super::{Table, Versioned};
use crate::paging::{InMemorySource, Paginator, Queryable};

impl Versioned for AppointmentRecord {
    fn stored_version(&self) -> u64 {
        self.audit.version
    }
}

impl Queryable for AppointmentRecord {
    fn row_id(&self) -> String {
        self.id.to_string()
    }

    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            fields::APPOINTMENT_ID => Some(self.id.as_str().into()),
            fields::SCHEDULED_BY => Some(self.scheduled_by.as_str().into()),
            fields::PLACE_ID => Some(self.place_id.as_str().into()),
            fields::STATUS => Some(self.status.as_str().into()),
            fields::IS_DELETED => Some(self.audit.is_deleted.into()),
            _ => None,
        }
    }

    fn sort_key(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            fields::SCHEDULE_TIME => Some(self.schedule_time),
            _ => None,
        }
    }
}

/// Appointments kept in a process-local map; serves both the write and the
/// read side.
#[derive(Debug)]
pub struct InMemoryAppointmentRepository {
    table: Table<AppointmentId, AppointmentRecord>,
    delete_policy: DeletePolicy,
    paginator: Paginator,
}

impl InMemoryAppointmentRepository {
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
    pub fn raw(&self, id: &AppointmentId) -> Result<Option<AppointmentRecord>, RepositoryError> {
        self.table.get(id)
    }

    fn live(&self, id: &AppointmentId) -> Result<Option<AppointmentRecord>, RepositoryError> {
        Ok(self.table.get(id)?.filter(|r| !r.audit.is_deleted))
    }
}

#[async_trait]
impl WriteRepository<Appointment> for InMemoryAppointmentRepository {
    async fn save(&self, entity: &Appointment) -> Result<(), RepositoryError> {
        self.table.put(
            entity.id().clone(),
            ExpectedVersion::for_save(entity.auditable()),
            entity.to_record(),
        )
    }

    async fn find_by_key(&self, key: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.live(key)?.map(Appointment::restore))
    }

    async fn delete(&self, entity: &Appointment) -> Result<(), RepositoryError> {
        let expected = ExpectedVersion::for_save(entity.auditable());
        match self.delete_policy {
            DeletePolicy::Soft => self.table.put(entity.id().clone(), expected, entity.to_record()),
            DeletePolicy::Hard => self.table.remove_checked(entity.id(), expected),
        }
    }

    async fn delete_by_key(&self, key: &AppointmentId) -> Result<(), RepositoryError> {
        self.table.remove(key)
    }
}

#[async_trait]
impl ReadRepository<AppointmentId, AppointmentSummary> for InMemoryAppointmentRepository {
    async fn find_by_key(&self, key: &AppointmentId) -> Result<Option<AppointmentSummary>, RepositoryError> {
        Ok(self.live(key)?.as_ref().map(AppointmentSummary::from))
    }
}

#[async_trait]
impl PagedReadRepository<AppointmentId, AppointmentSummary> for InMemoryAppointmentRepository {
    type Criteria = AppointmentCriteria;

    async fn find_all(
        &self,
        criteria: AppointmentCriteria,
    ) -> Result<Option<Page<AppointmentSummary>>, RepositoryError> {
        let source = InMemorySource::new(self.table.snapshot()?);
        let page = self
            .paginator
            .paginate(&source, criteria.page_request())
            .await?;
        Ok(page.map(|p| p.map(|record| AppointmentSummary::from(&record))))
    }
}
