//! Domain events: contract, per-aggregate buffering and publication.
//!
//! Aggregates buffer typed events in an `EventBuffer`. After a successful save
//! the application service drains the buffer, wraps each event in an
//! `EventEnvelope` and hands the batch to an `EventPublisher`.

pub mod buffer;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod publisher;

pub use buffer::EventBuffer;
pub use envelope::{CONTENT_TYPE_JSON, EventEnvelope};
pub use event::{DomainEvent, TOPIC_NAMESPACE, Topic};
pub use in_memory_bus::{InMemoryEventBus, Subscription};
pub use publisher::{EventPublisher, PublishError, publish_events};
