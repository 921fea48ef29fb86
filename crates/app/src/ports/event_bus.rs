//! Event bus port: publish state pushes to observers.

use std::future::Future;

use remotehub_domain::error::RemoteHubError;
use remotehub_domain::event::Event;

/// Publishes domain events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), RemoteHubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), RemoteHubError>> + Send {
        (**self).publish(event)
    }
}
