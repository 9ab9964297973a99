//! Appointment read models.
//!
//! `AppointmentSummary` is what read repositories return: references are
//! identifiers only. The gateway fetcher enriches summaries into the
//! per-use-case shapes below using the directory fetchers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::{AppointmentId, EmployeeId, PlaceId, UserId};
use bookings_directory::{Employee, Place, User};

use crate::appointment::AppointmentRecord;
use crate::status::AppointmentStatus;

/// Listing row of an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: AppointmentId,
    pub title: String,
    pub place_id: PlaceId,
    pub targeted_to: Option<EmployeeId>,
    pub scheduled_by: UserId,
    pub schedule_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: String,
    pub is_deleted: bool,
}

impl From<&AppointmentRecord> for AppointmentSummary {
    fn from(record: &AppointmentRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.to_string(),
            place_id: record.place_id.clone(),
            targeted_to: record.targeted_to.clone(),
            scheduled_by: record.scheduled_by.clone(),
            schedule_time: record.schedule_time,
            status: record.status,
            notes: record.notes.to_text(),
            is_deleted: record.audit.is_deleted,
        }
    }
}

/// Single appointment with every reference resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentDetails {
    pub id: AppointmentId,
    pub title: String,
    pub place: Place,
    pub targeted_to: Option<Employee>,
    pub scheduled_by: User,
    pub schedule_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: String,
}

/// Row of a user's appointment listing. The user is implied by the query.
///
/// References that could not be resolved are left empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAppointment {
    pub id: AppointmentId,
    pub title: String,
    pub place: Option<Place>,
    pub targeted_to: Option<Employee>,
    pub schedule_time: DateTime<Utc>,
    pub status: AppointmentStatus,
}

/// Row of a place's appointment listing. The place is implied by the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceAppointment {
    pub id: AppointmentId,
    pub title: String,
    pub targeted_to: Option<Employee>,
    pub scheduled_by: Option<User>,
    pub schedule_time: DateTime<Utc>,
    pub status: AppointmentStatus,
}
