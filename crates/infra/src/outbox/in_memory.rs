use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use bookings_events::EventEnvelope;

use super::{OutboxError, OutboxStore};

#[derive(Debug, Default)]
struct Entries {
    pending: Vec<EventEnvelope>,
    known: HashSet<Uuid>,
}

/// Process-local outbox.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    entries: Mutex<Entries>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> Result<usize, OutboxError> {
        Ok(self.lock()?.pending.len())
    }

    /// Unpublished envelopes, oldest first.
    pub fn pending(&self) -> Result<Vec<EventEnvelope>, OutboxError> {
        Ok(self.lock()?.pending.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>, OutboxError> {
        self.entries
            .lock()
            .map_err(|_| OutboxError::storage("outbox lock poisoned"))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<(), OutboxError> {
        let mut entries = self.lock()?;
        for event in events {
            if entries.known.insert(event.event_id()) {
                entries.pending.push(event);
            }
        }
        Ok(())
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<EventEnvelope>, OutboxError> {
        let entries = self.lock()?;
        Ok(entries.pending.iter().take(limit as usize).cloned().collect())
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), OutboxError> {
        let published: HashSet<&Uuid> = event_ids.iter().collect();
        self.lock()?
            .pending
            .retain(|event| !published.contains(&event.event_id()));
        Ok(())
    }
}
