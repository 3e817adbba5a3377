//! In-process event fan-out.
//!
//! The context publishes a [`StatusChanged`] event after every successful
//! phase; components reach the bus through `EventBusAware`.

use crate::di::Status;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 100;

pub type EventReceiver = broadcast::Receiver<Arc<dyn Any + Send + Sync>>;

/// Emitted when a context moves from one lifecycle status to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub context: String,
    pub from: Status,
    pub to: Status,
}

/// A simple in-memory event bus
#[derive(Clone)]
pub struct EventBus {
    // Map of Event Type -> Broadcast Sender
    channels: Arc<DashMap<TypeId, broadcast::Sender<Arc<dyn Any + Send + Sync>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish<E: Clone + Send + Sync + 'static>(&self, event: E) -> usize {
        let type_id = TypeId::of::<E>();
        match self.channels.get(&type_id) {
            Some(sender) => sender.send(Arc::new(event)).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to an event
    pub fn subscribe<E: Clone + Send + Sync + 'static>(&self) -> EventReceiver {
        let type_id = TypeId::of::<E>();
        let sender = self.channels.entry(type_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
            tx
        });
        sender.subscribe()
    }

    /// Receives the next event already waiting on `receiver`, if any.
    pub fn try_next<E: Clone + Send + Sync + 'static>(receiver: &mut EventReceiver) -> Option<E> {
        loop {
            match receiver.try_recv() {
                Ok(event) => return event.downcast_ref::<E>().cloned(),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event receiver lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(Ping(1)), 0);
    }

    #[test]
    fn subscribers_only_see_their_event_type() {
        let bus = EventBus::new();
        let mut pings = bus.subscribe::<Ping>();
        let mut statuses = bus.subscribe::<StatusChanged>();

        assert_eq!(bus.publish(Ping(7)), 1);
        assert_eq!(EventBus::try_next::<Ping>(&mut pings), Some(Ping(7)));
        assert_eq!(EventBus::try_next::<Ping>(&mut pings), None);
        assert_eq!(EventBus::try_next::<StatusChanged>(&mut statuses), None);
    }

    #[tokio::test]
    async fn receivers_can_await_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe::<StatusChanged>();
        bus.publish(StatusChanged {
            context: "app".into(),
            from: Status::Initialized,
            to: Status::Loaded,
        });
        let event = rx.recv().await.unwrap();
        let event = event.downcast_ref::<StatusChanged>().unwrap();
        assert_eq!(event.to, Status::Loaded);
    }
}
