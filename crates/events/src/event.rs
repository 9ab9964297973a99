use chrono::{DateTime, Utc};
use serde::Serialize;

/// First segment of every topic name.
pub const TOPIC_NAMESPACE: &str = "bookings";

/// Routing name of an event: `{namespace}.{platform}.{entity}.{action}`,
/// e.g. `bookings.iam.organization.created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic {
    platform: &'static str,
    entity: &'static str,
    action: &'static str,
}

impl Topic {
    pub const fn new(platform: &'static str, entity: &'static str, action: &'static str) -> Self {
        Self {
            platform,
            entity,
            action,
        }
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn action(&self) -> &'static str {
        self.action
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{TOPIC_NAMESPACE}.{}.{}.{}",
            self.platform, self.entity, self.action
        )
    }
}

/// A fact emitted by an aggregate transition.
///
/// Events are:
/// - **immutable** snapshots of the aggregate at emission time
/// - **versioned** (schema evolution)
/// - serialised as their JSON payload
pub trait DomainEvent: Clone + core::fmt::Debug + Serialize + Send + Sync + 'static {
    fn topic(&self) -> Topic;

    /// Partition key; events sharing a key are delivered in order.
    fn key(&self) -> String;

    /// Producer of the event (e.g. `/organizations`).
    fn source(&self) -> &'static str;

    /// Entity the event is about.
    fn subject(&self) -> String;

    /// When the transition happened (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Schema version for this event type.
    fn schema_version(&self) -> u32 {
        1
    }
}
