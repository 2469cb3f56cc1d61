//! # LogWriter: events as structured `tracing` records
//!
//! Maps each [`Event`] to one `tracing` record with the event's metadata as
//! fields. Failures, trips and exhausted budgets log at `WARN`, transitions at
//! `INFO`, high-frequency chatter at `DEBUG`.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO  faultguard: component started component="db" pid=4242
//! INFO  faultguard: status changed component="api" from=Healthy to=Degraded
//! WARN  faultguard: restart budget exhausted component="api" restarts=3
//! WARN  faultguard: circuit opened circuit="exchange" failures=5 recovery_ms=60000
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that writes every event through `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let component = e.component.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ComponentRegistered => debug!(component, "component registered"),
            EventKind::ComponentStarting => debug!(component, "component starting"),
            EventKind::ComponentStarted => info!(component, pid = ?e.pid, "component started"),
            EventKind::ComponentStartFailed => warn!(component, reason, "component failed to start"),
            EventKind::ComponentStopped => info!(component, "component stopped"),
            EventKind::StatusChanged => info!(
                component,
                from = ?e.previous,
                to = ?e.status,
                reason,
                "status changed"
            ),
            EventKind::ProcessExited => warn!(component, exit_code = ?e.exit_code, "process exited"),
            EventKind::RestartRequested => info!(
                component,
                restart = ?e.attempt,
                delay_ms = ?e.delay_ms,
                reason,
                "restarting component"
            ),
            EventKind::ComponentRestarted => {
                info!(component, restarts = ?e.attempt, "component restarted")
            }
            EventKind::RestartExhausted => {
                warn!(component, restarts = ?e.attempt, reason, "restart budget exhausted")
            }
            EventKind::HealthCheckFailed => {
                warn!(component, check = ?e.check, reason, "health check failing")
            }
            EventKind::HealthCheckRecovered => {
                info!(component, check = ?e.check, "health check recovered")
            }
            EventKind::CircuitOpened => warn!(
                circuit = component,
                failures = ?e.attempt,
                recovery_ms = ?e.delay_ms,
                "circuit opened"
            ),
            EventKind::CircuitHalfOpened => info!(circuit = component, "circuit half-open"),
            EventKind::CircuitClosed => info!(circuit = component, "circuit closed"),
            EventKind::CircuitRejected => {
                debug!(circuit = component, retry_in_ms = ?e.delay_ms, "call rejected")
            }
            EventKind::IncidentRecorded => info!(component, reason, "incident recorded"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::ShutdownCompleted => info!("shutdown completed"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = component, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = component, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
