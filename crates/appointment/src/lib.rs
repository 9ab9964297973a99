//! Appointment bounded context.
//!
//! Appointments are booked by users at a place, optionally targeted to an
//! employee. The aggregate enforces the scheduling rules and buffers one
//! event per transition; services persist it and publish those events.

pub mod appointment;
pub mod event;
pub mod notes;
pub mod read_model;
pub mod repository;
pub mod service;
pub mod status;

pub use appointment::{Appointment, AppointmentRecord, AppointmentUpdate, NewAppointment};
pub use event::{
    AppointmentCancelled, AppointmentCompleted, AppointmentDeleted, AppointmentEvent,
    AppointmentRescheduled, AppointmentScheduled, AppointmentSnapshot, AppointmentUpdated,
};
pub use notes::{Annotation, AnnotationKind, Notes};
pub use read_model::{AppointmentDetails, AppointmentSummary, PlaceAppointment, UserAppointment};
pub use repository::{AppointmentCriteria, AppointmentReadRepository, AppointmentRepository};
pub use service::{
    AdminManager, Fetcher, ListByPlace, ListByUser, LocalAdminManager, LocalGatewayFetcher,
    LocalScheduler, ScheduleAppointment, Scheduler,
};
pub use status::AppointmentStatus;
