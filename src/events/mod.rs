//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to telemetry emitted by the watchdog, the health monitor,
//! circuit breakers and the recovery system.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Watchdog`, `HealthMonitor`, `CircuitBreaker`,
//!   `ErrorRecoverySystem`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the runtime's subscriber listener, which fans out to the
//!   `SubscriberSet`, and any caller holding `Bus::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
