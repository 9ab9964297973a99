//! Event publication boundary.
//!
//! Publishers receive already-persisted state changes. Delivery is
//! at-least-once when backed by the outbox and at-most-once when a direct
//! publish fails after the save; consumers must be idempotent either way.
//! Publishers never retry internally.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bookings_core::ServiceError;

use crate::envelope::EventEnvelope;
use crate::event::DomainEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The transport rejected or could not accept the batch.
    #[error("publisher unavailable: {0}")]
    Unavailable(String),

    /// An event could not be serialised or decoded.
    #[error("event encoding failed: {0}")]
    Encode(String),
}

impl From<PublishError> for ServiceError {
    fn from(err: PublishError) -> Self {
        ServiceError::Publish(err.to_string())
    }
}

/// Sink for event envelopes (bus, outbox, broker client).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a batch in order. An empty batch is a no-op.
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError>;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError> {
        (**self).publish(events).await
    }
}

/// Wrap drained domain events and publish them as one batch.
pub async fn publish_events<E: DomainEvent>(
    publisher: &dyn EventPublisher,
    events: Vec<E>,
) -> Result<(), PublishError> {
    if events.is_empty() {
        return Ok(());
    }

    let envelopes = events
        .iter()
        .map(EventEnvelope::from_event)
        .collect::<Result<Vec<_>, _>>()?;

    let count = envelopes.len();
    publisher.publish(envelopes).await?;
    tracing::debug!(count, "published domain events");
    Ok(())
}
