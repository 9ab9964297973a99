//! In-memory event bus for tests/dev.

use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::publisher::{EventPublisher, PublishError};

/// Receiving side of an `InMemoryEventBus` subscription.
///
/// Each subscription gets a copy of every envelope published after it was
/// created, in publish order.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<EventEnvelope>,
}

impl Subscription {
    fn new(receiver: Receiver<EventEnvelope>) -> Self {
        Self { receiver }
    }

    /// Try to receive an envelope without blocking.
    pub fn try_recv(&self) -> Result<EventEnvelope, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an envelope.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<EventEnvelope, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything received so far, without blocking.
    pub fn drain(&self) -> Vec<EventEnvelope> {
        self.receiver.try_iter().collect()
    }
}

/// In-memory pub/sub bus.
///
/// - No IO
/// - Best-effort fan-out to live subscribers
/// - At-least-once acceptable (subscribers must be idempotent)
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<mpsc::Sender<EventEnvelope>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just receives nothing.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| PublishError::Unavailable("in-memory bus lock poisoned".to_string()))?;

        for envelope in events {
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| tx.send(envelope.clone()).is_ok());
        }

        Ok(())
    }
}
