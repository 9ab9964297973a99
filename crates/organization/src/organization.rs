use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::{Actor, AggregateRoot, AuditRecord, Auditable, Audited, OrganizationId};
use bookings_events::{DomainEvent, EventBuffer, Topic};

const EVENT_SOURCE: &str = "/organizations";
const PLATFORM: &str = "iam";
const ENTITY: &str = "organization";

/// Aggregate root: Organization.
///
/// A logical grouping of resources (employees, places). Creation always
/// succeeds; name uniqueness is a service-level rule.
#[derive(Debug, Clone)]
pub struct Organization {
    id: OrganizationId,
    name: String,
    audit: Auditable,
    events: EventBuffer<OrganizationEvent>,
}

/// Explicit set of optional changes for `Organization::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
}

impl OrganizationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

/// Stored shape of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: OrganizationId,
    pub name: String,
    pub audit: AuditRecord,
}

impl Organization {
    /// Create a new organization and buffer `OrganizationCreated`.
    pub fn new(id: OrganizationId, name: impl Into<String>, actor: &Actor) -> Self {
        let mut org = Self {
            id,
            name: name.into(),
            audit: Auditable::new(actor),
            events: EventBuffer::new(),
        };
        let created = OrganizationCreated {
            organization_id: org.id.clone(),
            name: org.name.clone(),
            create_time: org.audit.create_time(),
            create_by: actor.clone(),
        };
        org.events.record(OrganizationEvent::Created(created));
        org
    }

    /// Rehydrate from storage. No events are buffered.
    pub fn restore(record: OrganizationRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            audit: Auditable::restore(record.audit),
            events: EventBuffer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the given changes. Returns `false` (and changes nothing) when the
    /// update carries no fields.
    pub fn update(&mut self, actor: &Actor, update: OrganizationUpdate) -> bool {
        if update.is_empty() {
            return false;
        }

        if let Some(name) = update.name {
            self.name = name;
        }
        self.audit.record_update(actor);
        self.events
            .record(OrganizationEvent::Updated(OrganizationUpdated {
                organization_id: self.id.clone(),
                name: self.name.clone(),
                update_time: self.audit.last_update_time(),
                update_by: actor.clone(),
            }));
        true
    }

    /// Soft-delete and buffer `OrganizationDeleted`.
    pub fn delete(&mut self, actor: &Actor) {
        self.audit.record_delete(actor);
        self.events
            .record(OrganizationEvent::Deleted(OrganizationDeleted {
                organization_id: self.id.clone(),
                delete_time: self.audit.last_update_time(),
                delete_by: actor.clone(),
            }));
    }

    pub fn pending_events(&self) -> &[OrganizationEvent] {
        self.events.pending()
    }

    pub fn to_record(&self) -> OrganizationRecord {
        OrganizationRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            audit: self.audit.to_record(),
        }
    }
}

impl Audited for Organization {
    fn auditable(&self) -> &Auditable {
        &self.audit
    }
}

impl AggregateRoot for Organization {
    type Id = OrganizationId;
    type Event = OrganizationEvent;

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

/// Event: OrganizationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationCreated {
    pub organization_id: OrganizationId,
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub create_by: Actor,
}

/// Event: OrganizationUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationUpdated {
    pub organization_id: OrganizationId,
    pub name: String,
    pub update_time: DateTime<Utc>,
    pub update_by: Actor,
}

/// Event: OrganizationDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDeleted {
    pub organization_id: OrganizationId,
    pub delete_time: DateTime<Utc>,
    pub delete_by: Actor,
}

/// Organization domain events. Serialised as the inner payload; the variant
/// travels as the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrganizationEvent {
    Created(OrganizationCreated),
    Updated(OrganizationUpdated),
    Deleted(OrganizationDeleted),
}

impl OrganizationEvent {
    pub fn organization_id(&self) -> &OrganizationId {
        match self {
            OrganizationEvent::Created(e) => &e.organization_id,
            OrganizationEvent::Updated(e) => &e.organization_id,
            OrganizationEvent::Deleted(e) => &e.organization_id,
        }
    }
}

impl DomainEvent for OrganizationEvent {
    fn topic(&self) -> Topic {
        let action = match self {
            OrganizationEvent::Created(_) => "created",
            OrganizationEvent::Updated(_) => "updated",
            OrganizationEvent::Deleted(_) => "deleted",
        };
        Topic::new(PLATFORM, ENTITY, action)
    }

    fn key(&self) -> String {
        self.organization_id().to_string()
    }

    fn source(&self) -> &'static str {
        EVENT_SOURCE
    }

    fn subject(&self) -> String {
        self.organization_id().to_string()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrganizationEvent::Created(e) => e.create_time,
            OrganizationEvent::Updated(e) => e.update_time,
            OrganizationEvent::Deleted(e) => e.delete_time,
        }
    }
}
