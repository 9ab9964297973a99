use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::DomainEvent;
use crate::publisher::PublishError;

/// Content type of every envelope payload.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Transport-neutral wrapper around a serialised domain event.
///
/// Carries the CloudEvents-style attributes consumers route on (`topic`,
/// `source`, `subject`, `time`) plus the partition `key`. This is the unit
/// handed to publishers and stored in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    topic: String,
    key: String,
    source: String,
    subject: String,
    content_type: String,
    schema_version: u32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap a domain event, assigning a fresh UUIDv7 event id.
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, PublishError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| PublishError::Encode(format!("{}: {e}", event.topic())))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            topic: event.topic().to_string(),
            key: event.key(),
            source: event.source().to_string(),
            subject: event.subject(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            schema_version: event.schema_version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Decode the payload into a concrete event struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PublishError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| PublishError::Encode(format!("{}: {e}", self.topic)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Topic;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pinged {
        id: String,
        at: DateTime<Utc>,
    }

    impl DomainEvent for Pinged {
        fn topic(&self) -> Topic {
            Topic::new("test", "ping", "sent")
        }

        fn key(&self) -> String {
            self.id.clone()
        }

        fn source(&self) -> &'static str {
            "/pings"
        }

        fn subject(&self) -> String {
            self.id.clone()
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn envelope_carries_event_metadata() {
        let event = Pinged {
            id: "p-1".to_string(),
            at: Utc::now(),
        };

        let envelope = EventEnvelope::from_event(&event).unwrap();

        assert_eq!(envelope.topic(), "bookings.test.ping.sent");
        assert_eq!(envelope.key(), "p-1");
        assert_eq!(envelope.source(), "/pings");
        assert_eq!(envelope.content_type(), CONTENT_TYPE_JSON);
        assert_eq!(envelope.occurred_at(), event.at);
        assert_eq!(envelope.decode::<Pinged>().unwrap(), event);
    }
}
