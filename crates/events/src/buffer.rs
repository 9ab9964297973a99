//! Per-aggregate queue of events awaiting publication.

/// Ordered buffer of pending events.
///
/// Events are appended by aggregate operations and drained exactly once by
/// `pull_events`. The buffer is owned by its aggregate and never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuffer<E> {
    pending: Vec<E>,
}

impl<E> EventBuffer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: E) {
        self.pending.push(event);
    }

    /// Events recorded since the last drain, oldest first.
    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    /// Return all pending events in emission order and clear the buffer.
    pub fn pull_events(&mut self) -> Vec<E> {
        core::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_drains_in_order_once() {
        let mut buffer = EventBuffer::new();
        buffer.record("scheduled");
        buffer.record("cancelled");

        assert_eq!(buffer.pending(), &["scheduled", "cancelled"]);
        assert_eq!(buffer.pull_events(), vec!["scheduled", "cancelled"]);
        assert!(buffer.pull_events().is_empty());
        assert!(buffer.is_empty());
    }
}
