//! Reference data owned by neighbouring contexts: employees, places, users.
//!
//! These entities are read-only here. Appointment read models use the
//! fetchers to enrich rows that only carry identifiers.

pub mod employee;
pub mod fetcher;
pub mod place;
pub mod user;

pub use employee::Employee;
pub use fetcher::{Fetcher, LocalFetcher, ReferenceEntity};
pub use place::Place;
pub use user::User;

/// Fetcher for employees.
pub type EmployeeFetcher = dyn Fetcher<bookings_core::EmployeeId, Employee>;
/// Fetcher for places.
pub type PlaceFetcher = dyn Fetcher<bookings_core::PlaceId, Place>;
/// Fetcher for users.
pub type UserFetcher = dyn Fetcher<bookings_core::UserId, User>;
