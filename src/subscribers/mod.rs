//! # Event subscribers.
//!
//! Subscribers are the telemetry sink of the runtime: every state transition,
//! restart, breaker transition and incident reaches them as an [`Event`](crate::Event).
//!
//! ```text
//!   Bus ──► subscriber listener ──► SubscriberSet::emit(&Event)
//!                                        ├──► [queue] ─► LogWriter::on_event
//!                                        ├──► [queue] ─► metrics exporter
//!                                        └──► [queue] ─► custom
//! ```
//!
//! ## Implementing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use faultguard::{Event, EventKind, Subscribe};
//!
//! struct PagerDuty;
//!
//! #[async_trait]
//! impl Subscribe for PagerDuty {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::RestartExhausted {
//!             // page the on-call
//!         }
//!     }
//!     fn name(&self) -> &'static str { "pagerduty" }
//! }
//! ```

mod embedded;
mod set;
mod subscribe;

pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
