//! Postgres-backed repositories.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError | Scenario |
//! |------------|----------------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Insert of an existing key, concurrent insert, duplicate active name |
//! | Database (other) | Any other | `Storage` | Constraint or statement failures |
//! | PoolClosed / Io / Other | N/A | `Storage` | Connection problems |
//!
//! A conditional update or delete that matches no row is reported as
//! `Conflict` by the repositories themselves.
//!
//! ## Thread Safety
//!
//! Repositories hold an `Arc<PgPool>` and are `Send + Sync`.

mod appointment;
mod directory;
mod listing;
mod organization;

pub use appointment::PostgresAppointmentRepository;
pub use directory::{PostgresEmployeeDirectory, PostgresPlaceDirectory, PostgresUserDirectory};
pub use organization::PostgresOrganizationRepository;

use bookings_core::RepositoryError;

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => RepositoryError::Conflict(msg),
                _ => RepositoryError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::storage(format!("connection pool closed in {}", operation))
        }
        _ => RepositoryError::storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Version columns are `BIGINT`.
pub(crate) fn to_db_version(version: u64) -> i64 {
    version as i64
}

pub(crate) fn from_db_version(version: i64) -> u64 {
    version.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bookings_core::{
        Actor, AggregateRoot, OrganizationId, PagedReadRepository, WriteRepository,
    };
    use bookings_organization::{ListOrganizations, Organization, OrganizationRepository, OrganizationUpdate};

    use crate::config::AppConfig;
    use crate::db;
    use crate::paging::{PageTokenCipher, Paginator};

    #[test]
    fn non_database_errors_are_storage() {
        let err = map_sqlx_error("save", sqlx::Error::PoolClosed);
        assert!(matches!(err, RepositoryError::Storage(msg) if msg.contains("save")));

        let err = map_sqlx_error("find", sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Storage(_)));
    }

    // Run with: DATABASE_URL=postgres://... cargo test -p bookings-infra -- --ignored
    #[tokio::test]
    #[ignore]
    async fn organization_round_trip_against_postgres() {
        let config = AppConfig::from_env().unwrap();
        let pool = db::connect(&config.database).await.unwrap();
        db::apply_schema(&pool).await.unwrap();

        let repo = PostgresOrganizationRepository::new(
            pool,
            Paginator::new(Arc::new(PageTokenCipher::generate())),
        );
        let actor = Actor::new("it");
        let id = OrganizationId::new(uuid::Uuid::now_v7().to_string()).unwrap();
        let name = format!("org-{id}");

        let mut org = Organization::new(id.clone(), name.clone(), &actor);
        WriteRepository::save(&repo, &org).await.unwrap();
        org.mark_persisted();
        assert!(repo.exists_by_name(&name).await.unwrap());

        let mut stale = WriteRepository::find_by_key(&repo, &id).await.unwrap().unwrap();
        org.update(&actor, OrganizationUpdate::new().with_name(format!("{name}-2")));
        WriteRepository::save(&repo, &org).await.unwrap();
        org.mark_persisted();

        stale.update(&actor, OrganizationUpdate::new().with_name(format!("{name}-3")));
        let err = WriteRepository::save(&repo, &stale).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let page = repo
            .find_all(ListOrganizations::new().with_page_size(1000))
            .await
            .unwrap()
            .unwrap();
        assert!(page.items().iter().any(|o| o.id() == &id));

        org.delete(&actor);
        WriteRepository::delete(&repo, &org).await.unwrap();
        assert!(WriteRepository::find_by_key(&repo, &id).await.unwrap().is_none());
        assert!(!repo.exists_by_name(&format!("{name}-2")).await.unwrap());
    }
}
