//! Appointment application services.
//!
//! `Scheduler` serves end users, `AdminManager` serves administrators and
//! `Fetcher` serves reads. Write services always go through the write
//! repository; `Fetcher` reads from the (possibly lagging) read repository
//! and never backs a write decision.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use bookings_core::{
    Actor, AggregateRoot, AppointmentId, DomainError, EmployeeId, Entity, Filter, IdFactory, Page,
    PageRequest, PageToken, PagedReadRepository, PlaceId, ReadRepository, ServiceResult, Sort,
    Title, UserId, WriteRepository,
};
use bookings_directory::{EmployeeFetcher, Fetcher as _, PlaceFetcher, UserFetcher};
use bookings_events::{EventPublisher, publish_events};

use crate::appointment::{Appointment, AppointmentUpdate, NewAppointment};
use crate::read_model::{AppointmentDetails, AppointmentSummary, PlaceAppointment, UserAppointment};
use crate::repository::{AppointmentCriteria, AppointmentReadRepository, AppointmentRepository, fields};
use crate::status::AppointmentStatus;

const RESOURCE: &str = "appointment";

/// Arguments to book an appointment. Without an id one is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleAppointment {
    pub id: Option<AppointmentId>,
    pub title: String,
    pub place_id: PlaceId,
    pub targeted_to: Option<EmployeeId>,
    pub scheduled_by: UserId,
    pub schedule_time: DateTime<Utc>,
}

/// Booking operations available to end users.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, actor: &Actor, args: ScheduleAppointment) -> ServiceResult<Appointment>;

    async fn cancel(&self, actor: &Actor, id: &AppointmentId, reason: &str) -> ServiceResult<Appointment>;

    /// Rescheduling to the current time returns the appointment unchanged.
    async fn reschedule(
        &self,
        actor: &Actor,
        id: &AppointmentId,
        reason: &str,
        new_time: DateTime<Utc>,
    ) -> ServiceResult<Appointment>;
}

/// Administrative operations.
#[async_trait]
pub trait AdminManager: Send + Sync {
    async fn update_by_key(
        &self,
        actor: &Actor,
        id: &AppointmentId,
        update: AppointmentUpdate,
    ) -> ServiceResult<Appointment>;

    async fn complete_by_key(&self, actor: &Actor, id: &AppointmentId) -> ServiceResult<Appointment>;

    /// Deleting a missing appointment is a no-op.
    async fn delete_by_key(&self, actor: &Actor, id: &AppointmentId) -> ServiceResult<()>;
}

/// Read operations with references resolved.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_by_key(&self, id: &AppointmentId) -> ServiceResult<AppointmentDetails>;

    /// `NotFound` when the first page is empty.
    async fn list_by_user(&self, args: ListByUser) -> ServiceResult<Page<UserAppointment>>;

    /// `NotFound` when the first page is empty.
    async fn list_by_place(&self, args: ListByPlace) -> ServiceResult<Page<PlaceAppointment>>;
}

/// Criteria for a user's appointments, latest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListByUser {
    pub user_id: UserId,
    pub statuses: Vec<AppointmentStatus>,
    pub page_size: u32,
    pub page_token: Option<PageToken>,
}

impl ListByUser {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            statuses: Vec::new(),
            page_size: 0,
            page_token: None,
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = AppointmentStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    pub fn to_criteria(&self) -> AppointmentCriteria {
        listing_request(
            Filter::equal(fields::SCHEDULED_BY, self.user_id.as_str()),
            &self.statuses,
            self.page_size,
            self.page_token.clone(),
        )
    }
}

/// Criteria for a place's appointments, latest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListByPlace {
    pub place_id: PlaceId,
    pub statuses: Vec<AppointmentStatus>,
    pub page_size: u32,
    pub page_token: Option<PageToken>,
}

impl ListByPlace {
    pub fn new(place_id: PlaceId) -> Self {
        Self {
            place_id,
            statuses: Vec::new(),
            page_size: 0,
            page_token: None,
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = AppointmentStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    pub fn to_criteria(&self) -> AppointmentCriteria {
        listing_request(
            Filter::equal(fields::PLACE_ID, self.place_id.as_str()),
            &self.statuses,
            self.page_size,
            self.page_token.clone(),
        )
    }
}

fn listing_request(
    owner: Filter,
    statuses: &[AppointmentStatus],
    page_size: u32,
    page_token: Option<PageToken>,
) -> AppointmentCriteria {
    let mut request = PageRequest::new(Sort::descending(fields::SCHEDULE_TIME))
        .with_filter(owner)
        .with_filter(Filter::equal(fields::IS_DELETED, false))
        .with_page_size(page_size)
        .with_page_token(page_token);
    if !statuses.is_empty() {
        request = request.with_filter(Filter::one_of(
            fields::STATUS,
            statuses.iter().map(|s| s.as_str()),
        ));
    }
    AppointmentCriteria::new(request)
}

/// Load through the write repository; a missing appointment is `NotFound`.
async fn fetch_by_key(
    repository: &dyn AppointmentRepository,
    id: &AppointmentId,
) -> ServiceResult<Appointment> {
    repository
        .find_by_key(id)
        .await?
        .ok_or_else(|| DomainError::not_found(RESOURCE).into())
}

/// Save, mark persisted, then hand the drained events to the publisher.
async fn commit(
    repository: &dyn AppointmentRepository,
    publisher: &dyn EventPublisher,
    appointment: &mut Appointment,
) -> ServiceResult<()> {
    repository.save(appointment).await?;
    appointment.mark_persisted();
    publish_events(publisher, appointment.pull_events()).await?;
    Ok(())
}

/// `Scheduler` backed by the local write repository.
pub struct LocalScheduler {
    repository: Arc<dyn AppointmentRepository>,
    publisher: Arc<dyn EventPublisher>,
    ids: Arc<dyn IdFactory>,
}

impl LocalScheduler {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        publisher: Arc<dyn EventPublisher>,
        ids: Arc<dyn IdFactory>,
    ) -> Self {
        Self {
            repository,
            publisher,
            ids,
        }
    }
}

#[async_trait]
impl Scheduler for LocalScheduler {
    #[instrument(
        skip(self, actor, args),
        fields(actor = %actor, place_id = %args.place_id, appointment_id = tracing::field::Empty),
        err
    )]
    async fn schedule(&self, actor: &Actor, args: ScheduleAppointment) -> ServiceResult<Appointment> {
        let id = match args.id {
            Some(id) => id,
            None => AppointmentId::generate(self.ids.as_ref())?,
        };
        tracing::Span::current().record("appointment_id", tracing::field::display(&id));

        let mut appointment = Appointment::schedule(
            actor,
            NewAppointment {
                id,
                title: Title::new(&args.title)?,
                place_id: args.place_id,
                targeted_to: args.targeted_to,
                scheduled_by: args.scheduled_by,
                schedule_time: args.schedule_time,
            },
        )?;
        commit(self.repository.as_ref(), self.publisher.as_ref(), &mut appointment).await?;
        tracing::info!("appointment scheduled");
        Ok(appointment)
    }

    #[instrument(skip(self, actor, id, reason), fields(actor = %actor, appointment_id = %id), err)]
    async fn cancel(&self, actor: &Actor, id: &AppointmentId, reason: &str) -> ServiceResult<Appointment> {
        let mut appointment = fetch_by_key(self.repository.as_ref(), id).await?;
        appointment.cancel(actor, reason)?;
        commit(self.repository.as_ref(), self.publisher.as_ref(), &mut appointment).await?;
        Ok(appointment)
    }

    #[instrument(
        skip(self, actor, id, reason),
        fields(actor = %actor, appointment_id = %id, new_time = %new_time),
        err
    )]
    async fn reschedule(
        &self,
        actor: &Actor,
        id: &AppointmentId,
        reason: &str,
        new_time: DateTime<Utc>,
    ) -> ServiceResult<Appointment> {
        let mut appointment = fetch_by_key(self.repository.as_ref(), id).await?;
        if !appointment.reschedule(actor, reason, new_time)? {
            return Ok(appointment);
        }
        commit(self.repository.as_ref(), self.publisher.as_ref(), &mut appointment).await?;
        Ok(appointment)
    }
}

/// `AdminManager` backed by the local write repository.
pub struct LocalAdminManager {
    repository: Arc<dyn AppointmentRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl LocalAdminManager {
    pub fn new(repository: Arc<dyn AppointmentRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository,
            publisher,
        }
    }
}

#[async_trait]
impl AdminManager for LocalAdminManager {
    #[instrument(skip(self, actor, id, update), fields(actor = %actor, appointment_id = %id), err)]
    async fn update_by_key(
        &self,
        actor: &Actor,
        id: &AppointmentId,
        update: AppointmentUpdate,
    ) -> ServiceResult<Appointment> {
        let mut appointment = fetch_by_key(self.repository.as_ref(), id).await?;
        if appointment.update(actor, update)? {
            commit(self.repository.as_ref(), self.publisher.as_ref(), &mut appointment).await?;
        }
        Ok(appointment)
    }

    #[instrument(skip(self, actor, id), fields(actor = %actor, appointment_id = %id), err)]
    async fn complete_by_key(&self, actor: &Actor, id: &AppointmentId) -> ServiceResult<Appointment> {
        let mut appointment = fetch_by_key(self.repository.as_ref(), id).await?;
        appointment.mark_as_completed(actor);
        commit(self.repository.as_ref(), self.publisher.as_ref(), &mut appointment).await?;
        Ok(appointment)
    }

    #[instrument(skip(self, actor, id), fields(actor = %actor, appointment_id = %id), err)]
    async fn delete_by_key(&self, actor: &Actor, id: &AppointmentId) -> ServiceResult<()> {
        let Some(mut appointment) = self.repository.find_by_key(id).await? else {
            return Ok(());
        };

        appointment.delete(actor);
        self.repository.delete(&appointment).await?;
        appointment.mark_persisted();
        tracing::info!("appointment deleted");

        publish_events(self.publisher.as_ref(), appointment.pull_events()).await?;
        Ok(())
    }
}

/// `Fetcher` aggregating reference data at service level.
///
/// Listings resolve references with one batch call per referenced entity
/// type instead of one call per row.
pub struct LocalGatewayFetcher {
    repository: Arc<dyn AppointmentReadRepository>,
    places: Arc<PlaceFetcher>,
    employees: Arc<EmployeeFetcher>,
    users: Arc<UserFetcher>,
}

impl LocalGatewayFetcher {
    pub fn new(
        repository: Arc<dyn AppointmentReadRepository>,
        places: Arc<PlaceFetcher>,
        employees: Arc<EmployeeFetcher>,
        users: Arc<UserFetcher>,
    ) -> Self {
        Self {
            repository,
            places,
            employees,
            users,
        }
    }

    async fn list(&self, criteria: AppointmentCriteria) -> ServiceResult<Page<AppointmentSummary>> {
        self.repository
            .find_all(criteria)
            .await?
            .ok_or_else(|| DomainError::not_found(RESOURCE).into())
    }

    async fn employees_of(
        &self,
        rows: &[AppointmentSummary],
    ) -> ServiceResult<HashMap<EmployeeId, bookings_directory::Employee>> {
        let ids: Vec<EmployeeId> = rows.iter().filter_map(|r| r.targeted_to.clone()).collect();
        Ok(index(self.employees.list_by_keys(&ids).await?))
    }
}

fn index<V: Entity>(entities: Vec<V>) -> HashMap<V::Id, V>
where
    V::Id: Clone + Eq + std::hash::Hash,
{
    entities.into_iter().map(|e| (e.id().clone(), e)).collect()
}

#[async_trait]
impl Fetcher for LocalGatewayFetcher {
    #[instrument(skip(self, id), fields(appointment_id = %id), err)]
    async fn get_by_key(&self, id: &AppointmentId) -> ServiceResult<AppointmentDetails> {
        let summary = self
            .repository
            .find_by_key(id)
            .await?
            .filter(|s| !s.is_deleted)
            .ok_or(DomainError::not_found(RESOURCE))?;

        let place = self.places.get_by_key(&summary.place_id).await?;
        let scheduled_by = self.users.get_by_key(&summary.scheduled_by).await?;
        let targeted_to = match &summary.targeted_to {
            Some(employee_id) => Some(self.employees.get_by_key(employee_id).await?),
            None => None,
        };

        Ok(AppointmentDetails {
            id: summary.id,
            title: summary.title,
            place,
            targeted_to,
            scheduled_by,
            schedule_time: summary.schedule_time,
            status: summary.status,
            notes: summary.notes,
        })
    }

    #[instrument(skip(self, args), fields(user_id = %args.user_id), err)]
    async fn list_by_user(&self, args: ListByUser) -> ServiceResult<Page<UserAppointment>> {
        let page = self.list(args.to_criteria()).await?;

        let place_ids: Vec<PlaceId> = page.items().iter().map(|r| r.place_id.clone()).collect();
        let places = index(self.places.list_by_keys(&place_ids).await?);
        let employees = self.employees_of(page.items()).await?;

        Ok(page.map(|row| UserAppointment {
            place: places.get(&row.place_id).cloned(),
            targeted_to: row.targeted_to.as_ref().and_then(|e| employees.get(e).cloned()),
            id: row.id,
            title: row.title,
            schedule_time: row.schedule_time,
            status: row.status,
        }))
    }

    #[instrument(skip(self, args), fields(place_id = %args.place_id), err)]
    async fn list_by_place(&self, args: ListByPlace) -> ServiceResult<Page<PlaceAppointment>> {
        let page = self.list(args.to_criteria()).await?;

        let user_ids: Vec<UserId> = page.items().iter().map(|r| r.scheduled_by.clone()).collect();
        let users = index(self.users.list_by_keys(&user_ids).await?);
        let employees = self.employees_of(page.items()).await?;

        Ok(page.map(|row| PlaceAppointment {
            scheduled_by: users.get(&row.scheduled_by).cloned(),
            targeted_to: row.targeted_to.as_ref().and_then(|e| employees.get(e).cloned()),
            id: row.id,
            title: row.title,
            schedule_time: row.schedule_time,
            status: row.status,
        }))
    }
}
