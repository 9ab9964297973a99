use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::{
    Actor, AggregateRoot, AppointmentId, AuditRecord, Auditable, Audited, DomainError,
    DomainResult, EmployeeId, PlaceId, Title, UserId,
};
use bookings_events::EventBuffer;

use crate::event::{
    AppointmentCancelled, AppointmentCompleted, AppointmentDeleted, AppointmentEvent,
    AppointmentRescheduled, AppointmentScheduled, AppointmentSnapshot, AppointmentUpdated,
};
use crate::notes::{AnnotationKind, Notes};
use crate::status::AppointmentStatus;

pub(crate) const SCHEDULED_BEFORE_CURRENT_TIME: &str = "SCHEDULED_BEFORE_CURRENT_TIME";
pub(crate) const INVALID_STATUS: &str = "INVALID_STATUS";
pub(crate) const APPOINTMENT_ALREADY_COMPLETED: &str = "APPOINTMENT_ALREADY_COMPLETED";

/// Aggregate root: Appointment.
///
/// Fields are private; every state change goes through an operation that
/// validates the resulting state first, then records one audit update and
/// buffers one event. A failed operation leaves the aggregate untouched.
#[derive(Debug, Clone)]
pub struct Appointment {
    id: AppointmentId,
    title: Title,
    place_id: PlaceId,
    targeted_to: Option<EmployeeId>,
    scheduled_by: UserId,
    schedule_time: DateTime<Utc>,
    notes: Notes,
    status: AppointmentStatus,
    audit: Auditable,
    events: EventBuffer<AppointmentEvent>,
}

/// Arguments for `Appointment::schedule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub id: AppointmentId,
    pub title: Title,
    pub place_id: PlaceId,
    pub targeted_to: Option<EmployeeId>,
    pub scheduled_by: UserId,
    pub schedule_time: DateTime<Utc>,
}

/// Explicit set of optional changes for `Appointment::update`.
///
/// `note` is appended to the note history; it never replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentUpdate {
    pub title: Option<Title>,
    pub targeted_to: Option<EmployeeId>,
    pub schedule_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: Title) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_target(mut self, employee_id: EmployeeId) -> Self {
        self.targeted_to = Some(employee_id);
        self
    }

    pub fn with_schedule_time(mut self, time: DateTime<Utc>) -> Self {
        self.schedule_time = Some(time);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.targeted_to.is_none()
            && self.schedule_time.is_none()
            && self.note.is_none()
            && self.status.is_none()
    }
}

/// Stored shape of an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: AppointmentId,
    pub title: Title,
    pub place_id: PlaceId,
    pub targeted_to: Option<EmployeeId>,
    pub scheduled_by: UserId,
    pub schedule_time: DateTime<Utc>,
    pub notes: Notes,
    pub status: AppointmentStatus,
    pub audit: AuditRecord,
}

/// Validate a prospective state. Runs after every validated transition, so a
/// past schedule time blocks cancel and update as well as scheduling.
fn check(status: AppointmentStatus, schedule_time: DateTime<Utc>) -> DomainResult<()> {
    if schedule_time < Utc::now() {
        return Err(DomainError::invalid_argument(
            SCHEDULED_BEFORE_CURRENT_TIME,
            "appointment scheduled before current time",
        ));
    }
    if status == AppointmentStatus::Unknown {
        return Err(DomainError::invalid_argument(
            INVALID_STATUS,
            "status must be one of SCHEDULED, CANCELLED, COMPLETED",
        ));
    }
    Ok(())
}

fn already_completed() -> DomainError {
    DomainError::failed_precondition(
        APPOINTMENT_ALREADY_COMPLETED,
        "appointment is already completed",
    )
}

impl Appointment {
    /// Book a new appointment in `Scheduled` status and buffer `AppointmentScheduled`.
    pub fn schedule(actor: &Actor, args: NewAppointment) -> DomainResult<Self> {
        check(AppointmentStatus::Scheduled, args.schedule_time)?;

        let mut appointment = Self {
            id: args.id,
            title: args.title,
            place_id: args.place_id,
            targeted_to: args.targeted_to,
            scheduled_by: args.scheduled_by,
            schedule_time: args.schedule_time,
            notes: Notes::new(),
            status: AppointmentStatus::Scheduled,
            audit: Auditable::new(actor),
            events: EventBuffer::new(),
        };
        let event = AppointmentEvent::Scheduled(AppointmentScheduled {
            appointment: appointment.snapshot(),
            create_time: appointment.audit.create_time(),
            create_by: actor.clone(),
        });
        appointment.events.record(event);
        Ok(appointment)
    }

    /// Rehydrate from storage. No events are buffered and no rules re-run.
    pub fn restore(record: AppointmentRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            place_id: record.place_id,
            targeted_to: record.targeted_to,
            scheduled_by: record.scheduled_by,
            schedule_time: record.schedule_time,
            notes: record.notes,
            status: record.status,
            audit: Auditable::restore(record.audit),
            events: EventBuffer::new(),
        }
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn place_id(&self) -> &PlaceId {
        &self.place_id
    }

    pub fn targeted_to(&self) -> Option<&EmployeeId> {
        self.targeted_to.as_ref()
    }

    pub fn scheduled_by(&self) -> &UserId {
        &self.scheduled_by
    }

    pub fn schedule_time(&self) -> DateTime<Utc> {
        self.schedule_time
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    /// Flat text rendering of the note history.
    pub fn notes_text(&self) -> String {
        self.notes.to_text()
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn pending_events(&self) -> &[AppointmentEvent] {
        self.events.pending()
    }

    /// Cancel with a reason. Cancelling an already cancelled appointment
    /// succeeds again and appends another note.
    pub fn cancel(&mut self, actor: &Actor, reason: impl Into<String>) -> DomainResult<()> {
        if self.status == AppointmentStatus::Completed {
            return Err(already_completed());
        }
        check(AppointmentStatus::Cancelled, self.schedule_time)?;

        let reason = reason.into();
        self.audit.record_update(actor);
        let now = self.audit.last_update_time();
        self.notes.append(AnnotationKind::Cancel, reason.clone(), actor, now);
        self.status = AppointmentStatus::Cancelled;

        let event = AppointmentEvent::Cancelled(AppointmentCancelled {
            appointment: self.snapshot(),
            reason,
            cancel_time: now,
            cancel_by: actor.clone(),
        });
        self.events.record(event);
        Ok(())
    }

    /// Move to `new_time` and back to `Scheduled` (this also reopens a
    /// cancelled appointment). Returns `Ok(false)` without any change when
    /// `new_time` equals the current schedule time.
    pub fn reschedule(
        &mut self,
        actor: &Actor,
        reason: impl Into<String>,
        new_time: DateTime<Utc>,
    ) -> DomainResult<bool> {
        if self.status == AppointmentStatus::Completed {
            return Err(already_completed());
        }
        if new_time == self.schedule_time {
            return Ok(false);
        }
        check(AppointmentStatus::Scheduled, new_time)?;

        let reason = reason.into();
        let previous = self.schedule_time;
        self.audit.record_update(actor);
        let now = self.audit.last_update_time();
        self.notes.append(AnnotationKind::Reschedule, reason.clone(), actor, now);
        self.status = AppointmentStatus::Scheduled;
        self.schedule_time = new_time;

        let event = AppointmentEvent::Rescheduled(AppointmentRescheduled {
            appointment: self.snapshot(),
            reason,
            previous_schedule_time: previous,
            reschedule_time: now,
            reschedule_by: actor.clone(),
        });
        self.events.record(event);
        Ok(true)
    }

    /// Mark as completed. Unconditional and re-entrant.
    pub fn mark_as_completed(&mut self, actor: &Actor) {
        self.audit.record_update(actor);
        self.status = AppointmentStatus::Completed;

        let event = AppointmentEvent::Completed(AppointmentCompleted {
            appointment: self.snapshot(),
            complete_time: self.audit.last_update_time(),
            complete_by: actor.clone(),
        });
        self.events.record(event);
    }

    /// Apply an administrative update, validated once as a whole.
    /// Returns `Ok(false)` for an empty update.
    pub fn update(&mut self, actor: &Actor, update: AppointmentUpdate) -> DomainResult<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let status = update.status.unwrap_or(self.status);
        let schedule_time = update.schedule_time.unwrap_or(self.schedule_time);
        check(status, schedule_time)?;

        self.audit.record_update(actor);
        let now = self.audit.last_update_time();
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(employee_id) = update.targeted_to {
            self.targeted_to = Some(employee_id);
        }
        if let Some(note) = update.note {
            self.notes.append(AnnotationKind::Note, note, actor, now);
        }
        self.schedule_time = schedule_time;
        self.status = status;

        let event = AppointmentEvent::Updated(AppointmentUpdated {
            appointment: self.snapshot(),
            update_time: now,
            update_by: actor.clone(),
        });
        self.events.record(event);
        Ok(true)
    }

    /// Soft-delete. Unconditional.
    pub fn delete(&mut self, actor: &Actor) {
        self.audit.record_delete(actor);

        let event = AppointmentEvent::Deleted(AppointmentDeleted {
            appointment: self.snapshot(),
            delete_time: self.audit.last_update_time(),
            delete_by: actor.clone(),
        });
        self.events.record(event);
    }

    pub fn snapshot(&self) -> AppointmentSnapshot {
        AppointmentSnapshot {
            appointment_id: self.id.clone(),
            title: self.title.to_string(),
            place_id: self.place_id.clone(),
            targeted_to: self.targeted_to.clone(),
            scheduled_by: self.scheduled_by.clone(),
            schedule_time: self.schedule_time,
            status: self.status,
            version: self.audit.version(),
        }
    }

    pub fn to_record(&self) -> AppointmentRecord {
        AppointmentRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            place_id: self.place_id.clone(),
            targeted_to: self.targeted_to.clone(),
            scheduled_by: self.scheduled_by.clone(),
            schedule_time: self.schedule_time,
            notes: self.notes.clone(),
            status: self.status,
            audit: self.audit.to_record(),
        }
    }
}

impl Audited for Appointment {
    fn auditable(&self) -> &Auditable {
        &self.audit
    }
}

impl AggregateRoot for Appointment {
    type Id = AppointmentId;
    type Event = AppointmentEvent;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn pull_events(&mut self) -> Vec<Self::Event> {
        self.events.pull_events()
    }

    fn mark_persisted(&mut self) {
        self.audit.mark_committed();
    }
}
