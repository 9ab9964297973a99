//! Repository implementations.
//!
//! - `in_memory`: process-local maps; tests, demos and single-node runs.
//! - `postgres`: the production store.
//!
//! Both honour the same contracts: versioned saves, soft or hard deletes per
//! `DeletePolicy`, and sealed-token keyset pagination through `Paginator`.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryAppointmentRepository, InMemoryDirectory, InMemoryOrganizationRepository};
pub use postgres::{
    PostgresAppointmentRepository, PostgresEmployeeDirectory, PostgresOrganizationRepository,
    PostgresPlaceDirectory, PostgresUserDirectory,
};
