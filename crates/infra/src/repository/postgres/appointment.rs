use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use bookings_appointment::repository::fields;
use bookings_appointment::{
    Appointment, AppointmentCriteria, AppointmentRecord, AppointmentStatus, AppointmentSummary,
    Notes,
};
use bookings_core::{
    Actor, AggregateRoot, AppointmentId, AuditRecord, Audited, Cursor, DeletePolicy, EmployeeId,
    ExpectedVersion, Page, PagedReadRepository, PlaceId, ReadRepository, RepositoryError, Title,
    UserId, WriteRepository,
};

use super::listing::{Listing, PgListing};
use super::{from_db_version, map_sqlx_error, to_db_version};
use crate::paging::Paginator;

const SELECT_COLUMNS: &str = "appointment_id, title, place_id, employee_id, user_id, \
     schedule_time, notes, status, create_time, create_by, last_update_time, \
     last_update_by, row_version, is_deleted";

#[derive(Debug, Clone)]
struct AppointmentRow {
    appointment_id: String,
    title: String,
    place_id: String,
    employee_id: Option<String>,
    user_id: String,
    schedule_time: DateTime<Utc>,
    notes: Json<Notes>,
    status: String,
    create_time: DateTime<Utc>,
    create_by: String,
    last_update_time: DateTime<Utc>,
    last_update_by: String,
    row_version: i64,
    is_deleted: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AppointmentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AppointmentRow {
            appointment_id: row.try_get("appointment_id")?,
            title: row.try_get("title")?,
            place_id: row.try_get("place_id")?,
            employee_id: row.try_get("employee_id")?,
            user_id: row.try_get("user_id")?,
            schedule_time: row.try_get("schedule_time")?,
            notes: row.try_get("notes")?,
            status: row.try_get("status")?,
            create_time: row.try_get("create_time")?,
            create_by: row.try_get("create_by")?,
            last_update_time: row.try_get("last_update_time")?,
            last_update_by: row.try_get("last_update_by")?,
            row_version: row.try_get("row_version")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

fn corrupt(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::storage(format!("corrupt appointment row: {e}"))
}

impl TryFrom<AppointmentRow> for AppointmentRecord {
    type Error = RepositoryError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(AppointmentRecord {
            id: AppointmentId::new(row.appointment_id).map_err(corrupt)?,
            title: Title::new(row.title).map_err(corrupt)?,
            place_id: PlaceId::new(row.place_id).map_err(corrupt)?,
            targeted_to: row
                .employee_id
                .map(EmployeeId::new)
                .transpose()
                .map_err(corrupt)?,
            scheduled_by: UserId::new(row.user_id).map_err(corrupt)?,
            schedule_time: row.schedule_time,
            notes: row.notes.0,
            status: row.status.parse::<AppointmentStatus>().map_err(corrupt)?,
            audit: AuditRecord {
                create_time: row.create_time,
                create_by: Actor::new(row.create_by),
                last_update_time: row.last_update_time,
                last_update_by: Actor::new(row.last_update_by),
                version: from_db_version(row.row_version),
                is_deleted: row.is_deleted,
            },
        })
    }
}

struct AppointmentListing;

impl Listing for AppointmentListing {
    type Row = AppointmentRow;

    const TABLE: &'static str = "appointments";
    const ID_COLUMN: &'static str = "appointment_id";
    const COLUMNS: &'static str = SELECT_COLUMNS;

    fn filter_column(field: &str) -> Option<&'static str> {
        match field {
            fields::APPOINTMENT_ID => Some("appointment_id"),
            fields::SCHEDULED_BY => Some("user_id"),
            fields::PLACE_ID => Some("place_id"),
            fields::STATUS => Some("status"),
            fields::IS_DELETED => Some("is_deleted"),
            _ => None,
        }
    }

    fn sort_column(field: &str) -> Option<&'static str> {
        match field {
            fields::SCHEDULE_TIME => Some("schedule_time"),
            _ => None,
        }
    }

    fn decode(row: &PgRow) -> Result<AppointmentRow, sqlx::Error> {
        sqlx::FromRow::from_row(row)
    }

    fn cursor(row: &AppointmentRow, sort_field: &str) -> Option<Cursor> {
        (sort_field == fields::SCHEDULE_TIME)
            .then(|| Cursor::new(row.schedule_time, row.appointment_id.clone()))
    }
}

/// Appointments stored in the `appointments` table. Serves the write side and
/// the summary read side from the same rows.
#[derive(Debug, Clone)]
pub struct PostgresAppointmentRepository {
    pool: Arc<PgPool>,
    delete_policy: DeletePolicy,
    paginator: Paginator,
}

impl PostgresAppointmentRepository {
    pub fn new(pool: PgPool, paginator: Paginator) -> Self {
        Self {
            pool: Arc::new(pool),
            delete_policy: DeletePolicy::default(),
            paginator,
        }
    }

    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    async fn fetch_live(&self, id: &AppointmentId) -> Result<Option<AppointmentRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM appointments WHERE appointment_id = $1 AND NOT is_deleted"
        ))
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_appointment", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let row = <AppointmentRow as sqlx::FromRow<PgRow>>::from_row(&row)
            .map_err(|e| map_sqlx_error("decode_appointment", e))?;
        Ok(Some(row.try_into()?))
    }

    async fn insert(&self, record: &AppointmentRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                appointment_id, title, place_id, employee_id, user_id,
                schedule_time, notes, status, create_time, create_by,
                last_update_time, last_update_by, row_version, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.title.as_str())
        .bind(record.place_id.as_str())
        .bind(record.targeted_to.as_ref().map(|e| e.as_str().to_owned()))
        .bind(record.scheduled_by.as_str())
        .bind(record.schedule_time)
        .bind(Json(&record.notes))
        .bind(record.status.as_str())
        .bind(record.audit.create_time)
        .bind(record.audit.create_by.as_str())
        .bind(record.audit.last_update_time)
        .bind(record.audit.last_update_by.as_str())
        .bind(to_db_version(record.audit.version))
        .bind(record.audit.is_deleted)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_appointment", e))?;
        Ok(())
    }

    async fn update(&self, record: &AppointmentRecord, expected: u64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET title = $2,
                employee_id = $3,
                schedule_time = $4,
                notes = $5,
                status = $6,
                last_update_time = $7,
                last_update_by = $8,
                row_version = $9,
                is_deleted = $10
            WHERE appointment_id = $1 AND row_version = $11
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.title.as_str())
        .bind(record.targeted_to.as_ref().map(|e| e.as_str().to_owned()))
        .bind(record.schedule_time)
        .bind(Json(&record.notes))
        .bind(record.status.as_str())
        .bind(record.audit.last_update_time)
        .bind(record.audit.last_update_by.as_str())
        .bind(to_db_version(record.audit.version))
        .bind(record.audit.is_deleted)
        .bind(to_db_version(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_appointment", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::conflict(format!(
                "appointment {} is not at version {expected}",
                record.id
            )));
        }
        Ok(())
    }

    async fn write(&self, entity: &Appointment) -> Result<(), RepositoryError> {
        let record = entity.to_record();
        match ExpectedVersion::for_save(entity.auditable()) {
            ExpectedVersion::Exact(expected) => self.update(&record, expected).await,
            _ => self.insert(&record).await,
        }
    }
}

#[async_trait]
impl WriteRepository<Appointment> for PostgresAppointmentRepository {
    #[instrument(skip(self, entity), fields(appointment_id = %entity.id(), version = entity.version()), err)]
    async fn save(&self, entity: &Appointment) -> Result<(), RepositoryError> {
        self.write(entity).await
    }

    #[instrument(skip(self, key), fields(appointment_id = %key), err)]
    async fn find_by_key(&self, key: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.fetch_live(key).await?.map(Appointment::restore))
    }

    #[instrument(skip(self, entity), fields(appointment_id = %entity.id(), policy = ?self.delete_policy), err)]
    async fn delete(&self, entity: &Appointment) -> Result<(), RepositoryError> {
        let DeletePolicy::Hard = self.delete_policy else {
            return self.write(entity).await;
        };
        let Some(expected) = entity.auditable().committed_version() else {
            return Ok(());
        };

        let result = sqlx::query("DELETE FROM appointments WHERE appointment_id = $1 AND row_version = $2")
            .bind(entity.id().as_str())
            .bind(to_db_version(expected))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_appointment", e))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::conflict(format!(
                "appointment {} is not at version {expected}",
                entity.id()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, key), fields(appointment_id = %key), err)]
    async fn delete_by_key(&self, key: &AppointmentId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM appointments WHERE appointment_id = $1")
            .bind(key.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_appointment_by_key", e))?;
        Ok(())
    }
}

#[async_trait]
impl ReadRepository<AppointmentId, AppointmentSummary> for PostgresAppointmentRepository {
    async fn find_by_key(&self, key: &AppointmentId) -> Result<Option<AppointmentSummary>, RepositoryError> {
        Ok(self.fetch_live(key).await?.as_ref().map(AppointmentSummary::from))
    }
}

#[async_trait]
impl PagedReadRepository<AppointmentId, AppointmentSummary> for PostgresAppointmentRepository {
    type Criteria = AppointmentCriteria;

    #[instrument(skip(self, criteria), fields(item_count = tracing::field::Empty), err)]
    async fn find_all(
        &self,
        criteria: AppointmentCriteria,
    ) -> Result<Option<Page<AppointmentSummary>>, RepositoryError> {
        let source = PgListing::<AppointmentListing>::new(&self.pool);
        let Some(page) = self.paginator.paginate(&source, criteria.page_request()).await? else {
            return Ok(None);
        };
        Span::current().record("item_count", page.len());

        let previous = page.previous_page_token().cloned();
        let next = page.next_page_token().cloned();
        let items = page
            .into_items()
            .into_iter()
            .map(|row| AppointmentRecord::try_from(row).map(|r| AppointmentSummary::from(&r)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Page::new(items, previous, next)))
    }
}
