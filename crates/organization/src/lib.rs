//! Organization bounded context.
//!
//! An organization groups the employees and places of a business. This crate
//! holds the aggregate, its events, the repository contracts and the
//! application services (manager, fetcher, lister). Storage lives in
//! `bookings-infra`.

pub mod organization;
pub mod repository;
pub mod service;

pub use organization::{
    Organization, OrganizationCreated, OrganizationDeleted, OrganizationEvent,
    OrganizationRecord, OrganizationUpdate, OrganizationUpdated,
};
pub use repository::{ListOrganizations, OrganizationReadRepository, OrganizationRepository};
pub use service::{
    Fetcher, LocalFetcher, LocalLister, LocalManager, Lister, Manager, RegisterOrganization,
};
