//! Appointment persistence contracts.

use bookings_core::{AppointmentId, PagedReadRepository, PageRequest, WriteRepository};

use crate::appointment::Appointment;
use crate::read_model::AppointmentSummary;

/// Listing field names understood by appointment read repositories.
pub mod fields {
    pub const APPOINTMENT_ID: &str = "appointment_id";
    pub const SCHEDULED_BY: &str = "user_id";
    pub const PLACE_ID: &str = "place_id";
    pub const SCHEDULE_TIME: &str = "schedule_time";
    pub const STATUS: &str = "status";
    pub const IS_DELETED: &str = "is_deleted";
}

/// Write side for appointments.
pub trait AppointmentRepository: WriteRepository<Appointment> {}

impl<T> AppointmentRepository for T where T: WriteRepository<Appointment> {}

/// Read side for appointments.
pub trait AppointmentReadRepository:
    PagedReadRepository<AppointmentId, AppointmentSummary, Criteria = AppointmentCriteria>
{
}

impl<T> AppointmentReadRepository for T where
    T: PagedReadRepository<AppointmentId, AppointmentSummary, Criteria = AppointmentCriteria>
{
}

/// Listing criteria for appointment read repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentCriteria(PageRequest);

impl AppointmentCriteria {
    pub fn new(request: PageRequest) -> Self {
        Self(request)
    }

    pub fn page_request(&self) -> &PageRequest {
        &self.0
    }

    pub fn into_page_request(self) -> PageRequest {
        self.0
    }
}

impl From<PageRequest> for AppointmentCriteria {
    fn from(request: PageRequest) -> Self {
        Self(request)
    }
}
