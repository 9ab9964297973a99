//! Postgres pool construction and schema bootstrap.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::instrument;

use crate::config::{ConfigError, DatabaseConfig};

/// Idempotent DDL for every table the repositories and the outbox use.
pub const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Open a pool with the configured size and acquire timeout.
#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let url = config.require_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(url)
        .await?;
    tracing::info!("database pool ready");
    Ok(pool)
}

/// Create missing tables and indexes.
#[instrument(skip(pool), err)]
pub async fn apply_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
