//! # Runtime events emitted by the fault-tolerance core.
//!
//! The [`EventKind`] enum classifies telemetry into four groups:
//! - **Component events**: lifecycle and state-machine transitions driven by the watchdog
//! - **Health events**: a health check flipped between passing and failing
//! - **Circuit events**: breaker transitions and rejected calls
//! - **Recovery / runtime events**: incidents, shutdown, subscriber trouble
//!
//! The [`Event`] struct carries the optional metadata (component, status,
//! reason, restart count, delays) relevant to its kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use it to restore order when events reach different
//! subscribers at different times.
//!
//! ## Example
//! ```rust
//! use faultguard::{ComponentStatus, Event, EventKind};
//!
//! let ev = Event::new(EventKind::StatusChanged)
//!     .with_component("api")
//!     .with_transition(ComponentStatus::Healthy, ComponentStatus::Degraded)
//!     .with_reason("health check failing");
//!
//! assert_eq!(ev.kind, EventKind::StatusChanged);
//! assert_eq!(ev.status, Some(ComponentStatus::Degraded));
//! assert_eq!(ev.previous, Some(ComponentStatus::Healthy));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::components::ComponentStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Component events ===
    /// A component spec was accepted by the watchdog.
    ///
    /// Sets: `component`
    ComponentRegistered,

    /// The watchdog is launching a component's process.
    ///
    /// Sets: `component`
    ComponentStarting,

    /// The process was spawned and health checks registered.
    ///
    /// Sets: `component`, `pid`
    ComponentStarted,

    /// Launching the process failed; the component is now `Unhealthy`.
    ///
    /// Sets: `component`, `reason`
    ComponentStartFailed,

    /// The component was stopped (explicitly, by shutdown, or as part of a restart).
    ///
    /// Sets: `component`
    ComponentStopped,

    /// The component's status changed.
    ///
    /// Sets: `component`, `previous`, `status`, `reason` (optional)
    StatusChanged,

    /// The monitoring loop found the process dead.
    ///
    /// Sets: `component`, `exit_code` (None when killed by a signal)
    ProcessExited,

    /// A restart cycle begins.
    ///
    /// Sets: `component`, `reason`, `attempt` (restart number about to happen), `delay_ms`
    RestartRequested,

    /// A restart cycle finished and the component is running again.
    ///
    /// Sets: `component`, `attempt` (restart count after the cycle)
    ComponentRestarted,

    /// A restart was refused because the budget is spent.
    ///
    /// Sets: `component`, `attempt` (restart count), `reason`
    RestartExhausted,

    // === Health events ===
    /// A health check crossed its failure threshold.
    ///
    /// Sets: `component`, `check`, `reason` (error or "timeout" when available)
    HealthCheckFailed,

    /// A failing health check crossed its success threshold again.
    ///
    /// Sets: `component`, `check`
    HealthCheckRecovered,

    // === Circuit breaker events ===
    /// A breaker tripped open.
    ///
    /// Sets: `component` (breaker name), `attempt` (failure count), `delay_ms` (recovery timeout)
    CircuitOpened,

    /// An open breaker admitted a probe.
    ///
    /// Sets: `component` (breaker name)
    CircuitHalfOpened,

    /// A breaker closed after enough successful probes (or a manual reset).
    ///
    /// Sets: `component` (breaker name)
    CircuitClosed,

    /// A call was rejected by an open breaker.
    ///
    /// Sets: `component` (breaker name), `delay_ms` (time until the next probe)
    CircuitRejected,

    // === Recovery events ===
    /// An incident report was appended to the incident log.
    ///
    /// Sets: `component` (originating component, if known), `reason` (summary)
    IncidentRecorded,

    // === Runtime events ===
    /// Shutdown was requested (signal or explicit call).
    ShutdownRequested,

    /// All components were stopped during shutdown.
    ShutdownCompleted,

    /// A subscriber panicked while processing an event.
    ///
    /// Sets: `component` (subscriber name), `reason`
    SubscriberPanicked,

    /// A subscriber's queue was full or closed and an event was dropped.
    ///
    /// Sets: `component` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Component (or breaker / subscriber) the event concerns.
    pub component: Option<Arc<str>>,
    /// Health-check name for health events.
    pub check: Option<Arc<str>>,
    /// New status for `StatusChanged`.
    pub status: Option<ComponentStatus>,
    /// Previous status for `StatusChanged`.
    pub previous: Option<ComponentStatus>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Restart count or failure count, depending on the kind.
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Process id.
    pub pid: Option<u32>,
    /// Process exit code.
    pub exit_code: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            component: None,
            check: None,
            status: None,
            previous: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            pid: None,
            exit_code: None,
        }
    }

    #[inline]
    pub fn with_component(mut self, name: impl Into<Arc<str>>) -> Self {
        self.component = Some(name.into());
        self
    }

    #[inline]
    pub fn with_check(mut self, name: impl Into<Arc<str>>) -> Self {
        self.check = Some(name.into());
        self
    }

    /// Attaches a `from → to` status transition.
    #[inline]
    pub fn with_transition(mut self, from: ComponentStatus, to: ComponentStatus) -> Self {
        self.previous = Some(from);
        self.status = Some(to);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_component(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_component(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber machinery itself.
    ///
    /// These are never re-fed into the subscriber set to avoid feedback loops.
    #[inline]
    pub fn is_subscriber_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
