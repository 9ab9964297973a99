//! `bookings-core`: domain building blocks shared by every bounded context.
//!
//! Pure domain primitives plus the persistence contracts; no IO lives here.

pub mod aggregate;
pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod paging;
pub mod repository;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use audit::{Actor, AuditRecord, Auditable, Audited};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, RepositoryError, ServiceError, ServiceResult};
pub use id::{AppointmentId, EmployeeId, IdFactory, OrganizationId, PlaceId, UserId, UuidV7Factory};
pub use paging::{
    Cursor, CursorDirection, Filter, FilterOp, FilterValue, Page, PageRequest, PageToken, Sort,
    SortDirection,
};
pub use repository::{
    BatchReadRepository, DeletePolicy, PagedReadRepository, ReadRepository, WriteRepository,
};
pub use value_object::{SpatialLocation, Title, ValueObject};
