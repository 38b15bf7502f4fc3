use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::CatalogEvent;

/// In-process event bus backed by `tokio::broadcast`.
/// Single-node; events are not persisted.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CatalogEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers. Having no subscribers
    /// is not a failure; the event is simply dropped.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("event dropped, no subscribers");
                0
            }
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
