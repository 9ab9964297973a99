//! Transactional-outbox style delivery of domain events.
//!
//! Services publish into an `OutboxPublisher`, which only appends envelopes
//! to an `OutboxStore`. An `OutboxRelay` later drains pending envelopes to the
//! real downstream publisher and marks them published. Delivery is
//! at-least-once: a crash between publish and mark re-sends the batch.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryOutbox;
pub use postgres::PostgresOutbox;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use bookings_events::{EventEnvelope, EventPublisher, PublishError};

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl OutboxError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Durable queue of envelopes awaiting delivery.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Append envelopes in order. Re-appending a known event id is a no-op.
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<(), OutboxError>;

    /// Oldest unpublished envelopes, at most `limit`.
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<EventEnvelope>, OutboxError>;

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), OutboxError>;
}

/// `EventPublisher` that writes to an outbox instead of a transport.
#[derive(Clone)]
pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
}

impl OutboxPublisher {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventPublisher for OutboxPublisher {
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError> {
        if events.is_empty() {
            return Ok(());
        }
        self.store
            .append(events)
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))
    }
}

/// Downstream that only logs what it receives. Stands in for a broker
/// client in local runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError> {
        for event in &events {
            info!(
                event_id = %event.event_id(),
                topic = event.topic(),
                key = event.key(),
                subject = event.subject(),
                "event delivered"
            );
        }
        Ok(())
    }
}

/// Moves pending outbox entries to a downstream publisher.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    downstream: Arc<dyn EventPublisher>,
    batch_size: u32,
}

impl OutboxRelay {
    pub fn new(store: Arc<dyn OutboxStore>, downstream: Arc<dyn EventPublisher>, batch_size: u32) -> Self {
        Self {
            store,
            downstream,
            batch_size: batch_size.max(1),
        }
    }

    /// Deliver one batch. Returns how many envelopes were delivered.
    #[instrument(skip(self), fields(batch_size = self.batch_size), err)]
    pub async fn relay_once(&self) -> Result<usize, OutboxError> {
        let pending = self.store.fetch_pending(self.batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = pending.iter().map(EventEnvelope::event_id).collect();
        self.downstream.publish(pending).await?;
        self.store.mark_published(&ids).await?;
        debug!(delivered = ids.len(), "outbox batch relayed");
        Ok(ids.len())
    }

    /// Run `relay_once` every `interval` until shutdown. Full batches are
    /// followed immediately by another pass.
    pub fn spawn(self, interval: Duration) -> RelayHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                let drained_batch = match self.relay_once().await {
                    Ok(n) => n as u32 >= self.batch_size,
                    Err(err) => {
                        warn!(error = %err, "outbox relay pass failed");
                        false
                    }
                };
                if drained_batch {
                    tokio::task::yield_now().await;
                    continue;
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("outbox relay stopped");
        });

        RelayHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

/// Handle to stop and join a running relay.
#[derive(Debug)]
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl RelayHandle {
    /// Request shutdown and wait for the relay task to finish its pass.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "outbox relay task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bookings_events::{DomainEvent, Topic, publish_events};
    use chrono::{DateTime, Utc};
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        n: u32,
    }

    impl DomainEvent for Pinged {
        fn topic(&self) -> Topic {
            Topic::new("test", "ping", "pinged")
        }

        fn key(&self) -> String {
            "k".into()
        }

        fn source(&self) -> &'static str {
            "/pings"
        }

        fn subject(&self) -> String {
            self.n.to_string()
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<EventEnvelope>>,
        fail: bool,
    }

    #[async_trait]
    impl EventPublisher for Collecting {
        async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Unavailable("down".into()));
            }
            self.seen.lock().unwrap().extend(events);
            Ok(())
        }
    }

    async fn outbox_with(count: u32) -> Arc<InMemoryOutbox> {
        let outbox = Arc::new(InMemoryOutbox::new());
        let publisher = OutboxPublisher::new(outbox.clone());
        let events: Vec<Pinged> = (0..count).map(|n| Pinged { n }).collect();
        publish_events(&publisher, events).await.unwrap();
        outbox
    }

    #[tokio::test]
    async fn relay_delivers_in_order_and_marks_published() {
        let outbox = outbox_with(3).await;
        let downstream = Arc::new(Collecting::default());
        let relay = OutboxRelay::new(outbox.clone(), downstream.clone(), 2);

        assert_eq!(relay.relay_once().await.unwrap(), 2);
        assert_eq!(relay.relay_once().await.unwrap(), 1);
        assert_eq!(relay.relay_once().await.unwrap(), 0);

        let subjects: Vec<String> = downstream
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.subject().to_string())
            .collect();
        assert_eq!(subjects, vec!["0", "1", "2"]);
        assert_eq!(outbox.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_delivery_leaves_events_pending() {
        let outbox = outbox_with(2).await;
        let downstream = Arc::new(Collecting {
            fail: true,
            ..Default::default()
        });
        let relay = OutboxRelay::new(outbox.clone(), downstream, 10);

        let err = relay.relay_once().await.unwrap_err();

        assert!(matches!(err, OutboxError::Publish(PublishError::Unavailable(_))));
        assert_eq!(outbox.pending_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn spawned_relay_drains_and_stops() {
        let outbox = outbox_with(5).await;
        let downstream = Arc::new(Collecting::default());
        let handle = OutboxRelay::new(outbox.clone(), downstream.clone(), 2)
            .spawn(Duration::from_millis(10));

        for _ in 0..100 {
            if outbox.pending_count().unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(outbox.pending_count().unwrap(), 0);
        assert_eq!(downstream.seen.lock().unwrap().len(), 5);
    }

    /// Store that never runs dry: every fetch returns a full batch.
    struct Backlog {
        envelope: EventEnvelope,
    }

    #[async_trait]
    impl OutboxStore for Backlog {
        async fn append(&self, _events: Vec<EventEnvelope>) -> Result<(), OutboxError> {
            Ok(())
        }

        async fn fetch_pending(&self, limit: u32) -> Result<Vec<EventEnvelope>, OutboxError> {
            Ok(vec![self.envelope.clone(); limit as usize])
        }

        async fn mark_published(&self, _event_ids: &[Uuid]) -> Result<(), OutboxError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_stops_relay_under_constant_backlog() {
        let store = Arc::new(Backlog {
            envelope: EventEnvelope::from_event(&Pinged { n: 0 }).unwrap(),
        });
        let downstream = Arc::new(Collecting::default());
        let handle = OutboxRelay::new(store, downstream.clone(), 4).spawn(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("relay did not stop");

        assert!(!downstream.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_publish_writes_nothing() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let publisher = OutboxPublisher::new(outbox.clone());

        publisher.publish(Vec::new()).await.unwrap();

        assert_eq!(outbox.pending_count().unwrap(), 0);
    }
}
