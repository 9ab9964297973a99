//! Reference tables owned by neighbouring contexts (`places`, `employees`,
//! `users`). Read-only for the appointment flows; `upsert` exists for seeding.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use bookings_core::{
    BatchReadRepository, EmployeeId, Entity, PlaceId, ReadRepository, RepositoryError,
    SpatialLocation, UserId,
};
use bookings_directory::{Employee, Place, User};

use super::map_sqlx_error;

fn corrupt(resource: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::storage(format!("corrupt {resource} row: {e}"))
}

/// Reorder `rows` to follow `keys`; keys without a row are skipped.
fn in_key_order<K: AsRef<str>, V: Entity<Id = K> + Clone>(keys: &[K], rows: Vec<V>) -> Vec<V> {
    keys.iter()
        .filter_map(|key| {
            rows.iter()
                .find(|row| row.id().as_ref() == key.as_ref())
                .cloned()
        })
        .collect()
}

fn key_strings<K: AsRef<str>>(keys: &[K]) -> Vec<String> {
    keys.iter().map(|k| k.as_ref().to_owned()).collect()
}

fn decode_place(row: &PgRow) -> Result<Place, RepositoryError> {
    let read = |e: sqlx::Error| map_sqlx_error("decode_place", e);
    let id: String = row.try_get("place_id").map_err(read)?;
    let name: String = row.try_get("name").map_err(read)?;
    let latitude: Option<f64> = row.try_get("latitude").map_err(read)?;
    let longitude: Option<f64> = row.try_get("longitude").map_err(read)?;

    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(SpatialLocation::new(lat, lon).map_err(|e| corrupt("place", e))?),
        _ => None,
    };
    Ok(Place::new(
        PlaceId::new(id).map_err(|e| corrupt("place", e))?,
        name,
        location,
    ))
}

fn decode_employee(row: &PgRow) -> Result<Employee, RepositoryError> {
    let read = |e: sqlx::Error| map_sqlx_error("decode_employee", e);
    let id: String = row.try_get("employee_id").map_err(read)?;
    let full_name: String = row.try_get("full_name").map_err(read)?;
    let hired_at: DateTime<Utc> = row.try_get("hired_at").map_err(read)?;
    Ok(Employee::new(
        EmployeeId::new(id).map_err(|e| corrupt("employee", e))?,
        full_name,
        hired_at,
    ))
}

fn decode_user(row: &PgRow) -> Result<User, RepositoryError> {
    let read = |e: sqlx::Error| map_sqlx_error("decode_user", e);
    let id: String = row.try_get("user_id").map_err(read)?;
    let full_name: String = row.try_get("full_name").map_err(read)?;
    Ok(User::new(UserId::new(id).map_err(|e| corrupt("user", e))?, full_name))
}

/// Places in the `places` table.
#[derive(Debug, Clone)]
pub struct PostgresPlaceDirectory {
    pool: Arc<PgPool>,
}

impl PostgresPlaceDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn upsert(&self, place: &Place) -> Result<(), RepositoryError> {
        let location = place.location();
        sqlx::query(
            r#"
            INSERT INTO places (place_id, name, latitude, longitude)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (place_id) DO UPDATE
            SET name = EXCLUDED.name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude
            "#,
        )
        .bind(place.id().as_str())
        .bind(place.name())
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_place", e))?;
        Ok(())
    }
}

#[async_trait]
impl ReadRepository<PlaceId, Place> for PostgresPlaceDirectory {
    #[instrument(skip(self, key), fields(place_id = %key), err)]
    async fn find_by_key(&self, key: &PlaceId) -> Result<Option<Place>, RepositoryError> {
        let row = sqlx::query("SELECT place_id, name, latitude, longitude FROM places WHERE place_id = $1")
            .bind(key.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_place", e))?;
        row.as_ref().map(decode_place).transpose()
    }
}

#[async_trait]
impl BatchReadRepository<PlaceId, Place> for PostgresPlaceDirectory {
    #[instrument(skip(self, keys), fields(key_count = keys.len()), err)]
    async fn find_all_by_keys(&self, keys: &[PlaceId]) -> Result<Vec<Place>, RepositoryError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT place_id, name, latitude, longitude FROM places WHERE place_id = ANY($1)")
            .bind(key_strings(keys))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_places", e))?;
        let places = rows.iter().map(decode_place).collect::<Result<Vec<_>, _>>()?;
        Ok(in_key_order(keys, places))
    }
}

/// Employees in the `employees` table.
#[derive(Debug, Clone)]
pub struct PostgresEmployeeDirectory {
    pool: Arc<PgPool>,
}

impl PostgresEmployeeDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn upsert(&self, employee: &Employee) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO employees (employee_id, full_name, hired_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (employee_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                hired_at = EXCLUDED.hired_at
            "#,
        )
        .bind(employee.id().as_str())
        .bind(employee.full_name())
        .bind(employee.hired_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_employee", e))?;
        Ok(())
    }
}

#[async_trait]
impl ReadRepository<EmployeeId, Employee> for PostgresEmployeeDirectory {
    #[instrument(skip(self, key), fields(employee_id = %key), err)]
    async fn find_by_key(&self, key: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        let row = sqlx::query("SELECT employee_id, full_name, hired_at FROM employees WHERE employee_id = $1")
            .bind(key.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_employee", e))?;
        row.as_ref().map(decode_employee).transpose()
    }
}

#[async_trait]
impl BatchReadRepository<EmployeeId, Employee> for PostgresEmployeeDirectory {
    #[instrument(skip(self, keys), fields(key_count = keys.len()), err)]
    async fn find_all_by_keys(&self, keys: &[EmployeeId]) -> Result<Vec<Employee>, RepositoryError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT employee_id, full_name, hired_at FROM employees WHERE employee_id = ANY($1)",
        )
        .bind(key_strings(keys))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_employees", e))?;
        let employees = rows.iter().map(decode_employee).collect::<Result<Vec<_>, _>>()?;
        Ok(in_key_order(keys, employees))
    }
}

/// Users in the `users` table.
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn upsert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, full_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.full_name())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_user", e))?;
        Ok(())
    }
}

#[async_trait]
impl ReadRepository<UserId, User> for PostgresUserDirectory {
    #[instrument(skip(self, key), fields(user_id = %key), err)]
    async fn find_by_key(&self, key: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT user_id, full_name FROM users WHERE user_id = $1")
            .bind(key.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(decode_user).transpose()
    }
}

#[async_trait]
impl BatchReadRepository<UserId, User> for PostgresUserDirectory {
    #[instrument(skip(self, keys), fields(key_count = keys.len()), err)]
    async fn find_all_by_keys(&self, keys: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT user_id, full_name FROM users WHERE user_id = ANY($1)")
            .bind(key_strings(keys))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_users", e))?;
        let users = rows.iter().map(decode_user).collect::<Result<Vec<_>, _>>()?;
        Ok(in_key_order(keys, users))
    }
}
