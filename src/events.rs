//! Event bus seam between the control plane and the container subsystem.
//!
//! Events are fire-and-forget: publishing with no subscribers is not an
//! error, and a slow subscriber only loses events for itself (broadcast
//! semantics). The container subsystem's contract for `ManualReload` is
//! "start missing containers, do not restart running ones".

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::Result;
use crate::service::EventPublisher;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Operator-triggered config reload; carries no payload
    ManualReload,
    /// A route was created or replaced
    RouteChanged,
    /// A route was removed
    RouteRemoved,
    /// An image was pushed to the embedded registry
    ImagePushed,
}

/// A published event. `payload` is `None` for kinds that carry nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    pub kind: EventKind,
    /// Optional payload (route domain, image name, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Event {
    /// Event with no payload.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Event carrying a payload string.
    #[must_use]
    pub fn with_payload(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: Some(payload.into()),
        }
    }
}

/// Broadcast-backed event bus.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: Event) -> Result<()> {
        // send() errs only when there are zero receivers; that is a normal
        // state for an optional subsystem, not a failure.
        match self.tx.send(event.clone()) {
            Ok(n) => debug!(kind = ?event.kind, subscribers = n, "Published event"),
            Err(_) => debug!(kind = ?event.kind, "Published event with no subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::ManualReload)).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ManualReload);
        assert!(event.payload.is_none());
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = EventBus::default();
        assert!(
            bus.publish(Event::with_payload(EventKind::RouteChanged, "a.example.com"))
                .is_ok()
        );
    }
}
