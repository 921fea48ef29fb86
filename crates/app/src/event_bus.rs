//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use remotehub_domain::error::RemoteHubError;
use remotehub_domain::event::Event;

use crate::ports::EventPublisher;

/// Default capacity used by the daemon.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of state pushes to every observer of the process.
///
/// Publishing succeeds with no subscribers; the event is dropped. Slow
/// subscribers lag and skip the oldest events rather than block publishers.
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for events published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), RemoteHubError>> + Send {
        // only fails without receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotehub_domain::id::EntityId;
    use remotehub_domain::remote::RemoteState;

    fn state_event(entity: &str) -> Event {
        Event::state_changed(EntityId::from(entity), &RemoteState::default())
    }

    #[tokio::test]
    async fn should_deliver_state_push_to_every_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = state_event("remote.den");
        let event_id = event.id;
        bus.publish(event).await.unwrap();

        assert_eq!(first.recv().await.unwrap().id, event_id);
        assert_eq!(second.recv().await.unwrap().id, event_id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::default();
        assert!(bus.publish(state_event("remote.den")).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(state_event("remote.early")).await.unwrap();

        let mut rx = bus.subscribe();
        bus.publish(state_event("remote.late")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.entity_id, Some(EntityId::from("remote.late")));
    }

    #[tokio::test]
    async fn should_publish_through_shared_handle() {
        let bus = std::sync::Arc::new(InProcessEventBus::new(4));
        let mut rx = bus.subscribe();
        let publisher = std::sync::Arc::clone(&bus);

        publisher.publish(state_event("remote.den")).await.unwrap();

        assert!(rx.try_recv().is_ok());
    }
}
