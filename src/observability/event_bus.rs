//! Tokio broadcast bus for cache lifecycle events.
//!
//! The batch driver subscribes here to learn about identity drift and purged
//! identifiers; skycascade itself only publishes.

use crate::models::CacheEvent;
use std::sync::OnceLock;
use tokio::sync::broadcast;

const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;

/// Broadcast bus for [`CacheEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

/// Receiver that only yields events matching a predicate.
pub struct FilteredReceiver<F> {
    receiver: broadcast::Receiver<CacheEvent>,
    predicate: F,
}

impl EventBus {
    /// Creates a bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event (best effort; dropped when nobody listens).
    pub fn publish(&self, event: CacheEvent) {
        metrics::counter!("event_bus_publish_total", "event" => event.event_type()).increment(1);
        if self.sender.send(event).is_err() {
            metrics::counter!("event_bus_unobserved_total").increment(1);
        }
    }

    /// Subscribes to every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Subscribes with a predicate.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, predicate: F) -> FilteredReceiver<F>
    where
        F: Fn(&CacheEvent) -> bool,
    {
        FilteredReceiver {
            receiver: self.sender.subscribe(),
            predicate,
        }
    }

    /// Subscribes to one event type (see [`CacheEvent::event_type`]).
    #[must_use]
    pub fn subscribe_event_type(
        &self,
        event_type: &'static str,
    ) -> FilteredReceiver<impl Fn(&CacheEvent) -> bool + use<>> {
        self.subscribe_filtered(move |event| event.event_type() == event_type)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&CacheEvent) -> bool,
{
    /// Receives the next matching event.
    pub async fn recv(&mut self) -> Result<CacheEvent, broadcast::error::RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if (self.predicate)(&event) => return Ok(event),
                Ok(_) => {},
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("event_bus_lagged_total").increment(skipped);
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Drains buffered events without waiting, keeping matching ones.
    pub fn drain(&mut self) -> Vec<CacheEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if (self.predicate)(&event) => events.push(event),
                Ok(_) => {},
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    metrics::counter!("event_bus_lagged_total").increment(skipped);
                },
                Err(_) => return events,
            }
        }
    }
}

static GLOBAL_EVENT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Returns the process-wide event bus.
#[must_use]
pub fn global_event_bus() -> &'static EventBus {
    GLOBAL_EVENT_BUS.get_or_init(EventBus::default)
}
