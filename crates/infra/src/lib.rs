//! Infrastructure layer: configuration, Postgres wiring, repositories,
//! sealed-token pagination and the event outbox.

pub mod config;
pub mod db;
pub mod outbox;
pub mod paging;
pub mod repository;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use outbox::{
    InMemoryOutbox, OutboxError, OutboxPublisher, OutboxRelay, OutboxStore, PostgresOutbox,
    RelayHandle, TracingPublisher,
};
pub use paging::{PageTokenCipher, Paginator};

#[cfg(test)]
mod integration_tests;
