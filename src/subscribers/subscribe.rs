//! # Core subscriber trait
//!
//! [`Subscribe`] is the extension point for plugging telemetry consumers into the
//! runtime. Each subscriber gets a dedicated worker fed by a bounded queue owned
//! by the [`SubscriberSet`](crate::SubscriberSet), so a slow subscriber never
//! stalls the watchdog or its peers.

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are dropped and a
    /// `SubscriberOverflow` event is published.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
