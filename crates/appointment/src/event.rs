//! Appointment domain events.
//!
//! Every event embeds a snapshot of the appointment at emission time and is
//! keyed by place so a place's events stay ordered on partitioned transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::{Actor, AppointmentId, EmployeeId, PlaceId, UserId};
use bookings_events::{DomainEvent, Topic};

use crate::status::AppointmentStatus;

const EVENT_SOURCE: &str = "/appointments";
const PLATFORM: &str = "places";
const ENTITY: &str = "appointment";

/// State of an appointment captured when an event was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSnapshot {
    pub appointment_id: AppointmentId,
    pub title: String,
    pub place_id: PlaceId,
    pub targeted_to: Option<EmployeeId>,
    pub scheduled_by: UserId,
    pub schedule_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub version: u64,
}

/// Event: AppointmentScheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentScheduled {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub create_time: DateTime<Utc>,
    pub create_by: Actor,
}

/// Event: AppointmentUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentUpdated {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub update_time: DateTime<Utc>,
    pub update_by: Actor,
}

/// Event: AppointmentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCancelled {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub reason: String,
    pub cancel_time: DateTime<Utc>,
    pub cancel_by: Actor,
}

/// Event: AppointmentRescheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRescheduled {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub reason: String,
    pub previous_schedule_time: DateTime<Utc>,
    pub reschedule_time: DateTime<Utc>,
    pub reschedule_by: Actor,
}

/// Event: AppointmentCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCompleted {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub complete_time: DateTime<Utc>,
    pub complete_by: Actor,
}

/// Event: AppointmentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDeleted {
    #[serde(flatten)]
    pub appointment: AppointmentSnapshot,
    pub delete_time: DateTime<Utc>,
    pub delete_by: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AppointmentEvent {
    Scheduled(AppointmentScheduled),
    Updated(AppointmentUpdated),
    Cancelled(AppointmentCancelled),
    Rescheduled(AppointmentRescheduled),
    Completed(AppointmentCompleted),
    Deleted(AppointmentDeleted),
}

impl AppointmentEvent {
    pub fn snapshot(&self) -> &AppointmentSnapshot {
        match self {
            AppointmentEvent::Scheduled(e) => &e.appointment,
            AppointmentEvent::Updated(e) => &e.appointment,
            AppointmentEvent::Cancelled(e) => &e.appointment,
            AppointmentEvent::Rescheduled(e) => &e.appointment,
            AppointmentEvent::Completed(e) => &e.appointment,
            AppointmentEvent::Deleted(e) => &e.appointment,
        }
    }

    /// Short name of the transition (`scheduled`, `cancelled`, ...).
    pub fn action(&self) -> &'static str {
        match self {
            AppointmentEvent::Scheduled(_) => "scheduled",
            AppointmentEvent::Updated(_) => "updated",
            AppointmentEvent::Cancelled(_) => "cancelled",
            AppointmentEvent::Rescheduled(_) => "rescheduled",
            AppointmentEvent::Completed(_) => "completed",
            AppointmentEvent::Deleted(_) => "deleted",
        }
    }
}

impl DomainEvent for AppointmentEvent {
    fn topic(&self) -> Topic {
        Topic::new(PLATFORM, ENTITY, self.action())
    }

    fn key(&self) -> String {
        self.snapshot().place_id.to_string()
    }

    fn source(&self) -> &'static str {
        EVENT_SOURCE
    }

    fn subject(&self) -> String {
        self.snapshot().appointment_id.to_string()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AppointmentEvent::Scheduled(e) => e.create_time,
            AppointmentEvent::Updated(e) => e.update_time,
            AppointmentEvent::Cancelled(e) => e.cancel_time,
            AppointmentEvent::Rescheduled(e) => e.reschedule_time,
            AppointmentEvent::Completed(e) => e.complete_time,
            AppointmentEvent::Deleted(e) => e.delete_time,
        }
    }
}
