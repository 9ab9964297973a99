use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use bookings_core::{
    Actor, AggregateRoot, AuditRecord, Audited, Cursor, DeletePolicy, ExpectedVersion,
    OrganizationId, Page, PagedReadRepository, ReadRepository, RepositoryError, WriteRepository,
};
use bookings_organization::repository::fields;
use bookings_organization::{
    ListOrganizations, Organization, OrganizationRecord, OrganizationRepository,
};

use super::listing::{Listing, PgListing};
use super::{from_db_version, map_sqlx_error, to_db_version};
use crate::paging::Paginator;

const SELECT_COLUMNS: &str = "organization_id, name, create_time, create_by, \
     last_update_time, last_update_by, row_version, is_deleted";

/// Row shape of the `organizations` table.
#[derive(Debug, Clone)]
struct OrganizationRow {
    organization_id: String,
    name: String,
    create_time: DateTime<Utc>,
    create_by: String,
    last_update_time: DateTime<Utc>,
    last_update_by: String,
    row_version: i64,
    is_deleted: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for OrganizationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrganizationRow {
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            create_time: row.try_get("create_time")?,
            create_by: row.try_get("create_by")?,
            last_update_time: row.try_get("last_update_time")?,
            last_update_by: row.try_get("last_update_by")?,
            row_version: row.try_get("row_version")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

impl TryFrom<OrganizationRow> for OrganizationRecord {
    type Error = RepositoryError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(OrganizationRecord {
            id: OrganizationId::new(row.organization_id)
                .map_err(|e| RepositoryError::storage(format!("corrupt organization row: {e}")))?,
            name: row.name,
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

struct OrganizationListing;

impl Listing for OrganizationListing {
    type Row = OrganizationRow;

    const TABLE: &'static str = "organizations";
    const ID_COLUMN: &'static str = "organization_id";
    const COLUMNS: &'static str = SELECT_COLUMNS;

    fn filter_column(field: &str) -> Option<&'static str> {
        match field {
            fields::ORGANIZATION_ID => Some("organization_id"),
            fields::NAME => Some("name"),
            fields::IS_DELETED => Some("is_deleted"),
            _ => None,
        }
    }

    fn sort_column(field: &str) -> Option<&'static str> {
        match field {
            fields::CREATE_TIME => Some("create_time"),
            _ => None,
        }
    }

    fn decode(row: &PgRow) -> Result<OrganizationRow, sqlx::Error> {
        sqlx::FromRow::from_row(row)
    }

    fn cursor(row: &OrganizationRow, sort_field: &str) -> Option<Cursor> {
        (sort_field == fields::CREATE_TIME)
            .then(|| Cursor::new(row.create_time, row.organization_id.clone()))
    }
}

/// Organizations stored in the `organizations` table.
#[derive(Debug, Clone)]
pub struct PostgresOrganizationRepository {
    pool: Arc<PgPool>,
    delete_policy: DeletePolicy,
    paginator: Paginator,
}

impl PostgresOrganizationRepository {
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

    async fn fetch_live(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM organizations WHERE organization_id = $1 AND NOT is_deleted"
        ))
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_organization", e))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let row = <OrganizationRow as sqlx::FromRow<PgRow>>::from_row(&row)
                    .map_err(|e| map_sqlx_error("decode_organization", e))?;
                Ok(Some(Organization::restore(row.try_into()?)))
            }
        }
    }

    async fn insert(&self, record: &OrganizationRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (
                organization_id, name, create_time, create_by,
                last_update_time, last_update_by, row_version, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(record.audit.create_time)
        .bind(record.audit.create_by.as_str())
        .bind(record.audit.last_update_time)
        .bind(record.audit.last_update_by.as_str())
        .bind(to_db_version(record.audit.version))
        .bind(record.audit.is_deleted)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_organization", e))?;
        Ok(())
    }

    async fn update(&self, record: &OrganizationRecord, expected: u64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = $2,
                last_update_time = $3,
                last_update_by = $4,
                row_version = $5,
                is_deleted = $6
            WHERE organization_id = $1 AND row_version = $7
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(record.audit.last_update_time)
        .bind(record.audit.last_update_by.as_str())
        .bind(to_db_version(record.audit.version))
        .bind(record.audit.is_deleted)
        .bind(to_db_version(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_organization", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::conflict(format!(
                "organization {} is not at version {expected}",
                record.id
            )));
        }
        Ok(())
    }

    async fn write(&self, entity: &Organization) -> Result<(), RepositoryError> {
        let record = entity.to_record();
        match ExpectedVersion::for_save(entity.auditable()) {
            ExpectedVersion::Exact(expected) => self.update(&record, expected).await,
            _ => self.insert(&record).await,
        }
    }
}

#[async_trait]
impl WriteRepository<Organization> for PostgresOrganizationRepository {
    #[instrument(skip(self, entity), fields(organization_id = %entity.id(), version = entity.version()), err)]
    async fn save(&self, entity: &Organization) -> Result<(), RepositoryError> {
        self.write(entity).await
    }

    #[instrument(skip(self, key), fields(organization_id = %key), err)]
    async fn find_by_key(&self, key: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.fetch_live(key).await
    }

    #[instrument(skip(self, entity), fields(organization_id = %entity.id(), policy = ?self.delete_policy), err)]
    async fn delete(&self, entity: &Organization) -> Result<(), RepositoryError> {
        let DeletePolicy::Hard = self.delete_policy else {
            return self.write(entity).await;
        };
        let Some(expected) = entity.auditable().committed_version() else {
            return Ok(());
        };

        let result = sqlx::query("DELETE FROM organizations WHERE organization_id = $1 AND row_version = $2")
            .bind(entity.id().as_str())
            .bind(to_db_version(expected))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_organization", e))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::conflict(format!(
                "organization {} is not at version {expected}",
                entity.id()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, key), fields(organization_id = %key), err)]
    async fn delete_by_key(&self, key: &OrganizationId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM organizations WHERE organization_id = $1")
            .bind(key.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_organization_by_key", e))?;
        Ok(())
    }
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    #[instrument(skip(self), err)]
    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM organizations WHERE name = $1 AND NOT is_deleted) AS taken",
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists_by_name", e))?;

        row.try_get("taken")
            .map_err(|e| map_sqlx_error("exists_by_name", e))
    }
}

#[async_trait]
impl ReadRepository<OrganizationId, Organization> for PostgresOrganizationRepository {
    async fn find_by_key(&self, key: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.fetch_live(key).await
    }
}

#[async_trait]
impl PagedReadRepository<OrganizationId, Organization> for PostgresOrganizationRepository {
    type Criteria = ListOrganizations;

    #[instrument(skip(self, criteria), fields(page_size = criteria.page_size, item_count = tracing::field::Empty), err)]
    async fn find_all(&self, criteria: ListOrganizations) -> Result<Option<Page<Organization>>, RepositoryError> {
        let source = PgListing::<OrganizationListing>::new(&self.pool);
        let Some(page) = self
            .paginator
            .paginate(&source, &criteria.to_page_request())
            .await?
        else {
            return Ok(None);
        };
        Span::current().record("item_count", page.len());

        let previous = page.previous_page_token().cloned();
        let next = page.next_page_token().cloned();
        let items = page
            .into_items()
            .into_iter()
            .map(|row| OrganizationRecord::try_from(row).map(Organization::restore))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Page::new(items, previous, next)))
    }
}
