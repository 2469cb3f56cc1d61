//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] so that every
//! subsystem can publish telemetry without knowing who listens.
//!
//! ```text
//! Watchdog ───────┐
//! HealthMonitor ──┼──► Bus ──► subscriber listener ──► SubscriberSet ──► LogWriter, ...
//! CircuitBreaker ─┤       └──► Bus::subscribe() (tests, chaos tooling)
//! Recovery ───────┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; events are dropped when nobody listens.
//! - The ring buffer is shared; receivers that fall behind observe `RecvError::Lagged(n)`.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers (fire-and-forget).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_receiver() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ComponentStarted).with_component("db"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ComponentStarted);
        assert_eq!(ev.component.as_deref(), Some("db"));
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
