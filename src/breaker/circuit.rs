//! # CircuitBreaker: fail fast while a dependency is down.
//!
//! ```text
//!            failures >= failure_threshold
//!   Closed ───────────────────────────────► Open
//!     ▲                                      │ now >= next_attempt
//!     │ successes >= success_threshold       ▼ (checked by can_execute)
//!     └────────────────────────────────── HalfOpen
//!                                            │ any failure
//!                                            └──────────► Open
//! ```
//!
//! ## Rules
//! - All state lives behind one `std::sync::Mutex`; the lock is never held
//!   across an `.await` or while publishing events.
//! - Counters only mean something relative to the current state. Both are
//!   zeroed on every transition into Closed or HalfOpen.
//! - In Closed, a success decays `failure_count` by one instead of clearing it.
//! - Time is `tokio::time::Instant`, so a paused test clock drives the breaker.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant};

use crate::error::CircuitError;
use crate::events::{Bus, Event, EventKind};

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass; failures are counted.
    Closed,
    /// Calls are rejected until the recovery timeout elapses.
    Open,
    /// Trial calls pass; one failure reopens, enough successes close.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and timeouts of one breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Breaker name, also used as the `component` of its events.
    pub name: String,
    /// Failures counted in Closed before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays Open before admitting a probe.
    pub recovery_timeout: Duration,
    /// Consecutive HalfOpen successes required to close.
    pub success_threshold: u32,
    /// Upper bound of one call made through [`CircuitBreaker::execute`].
    pub call_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Config with default thresholds:
    /// - `failure_threshold = 5`
    /// - `recovery_timeout = 60s`
    /// - `success_threshold = 2`
    /// - `call_timeout = 30s`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    pub fn with_success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n.max(1);
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// Time since the last recorded failure.
    pub since_last_failure: Option<Duration>,
    /// Time left until an Open breaker admits a probe.
    pub retry_in: Option<Duration>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            next_attempt: None,
        }
    }
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    bus: Option<Bus>,
}

impl CircuitBreaker {
    /// Creates a Closed breaker with no event bus attached.
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            inner: Mutex::new(BreakerState::closed()),
            bus: None,
        }
    }

    /// Publishes transitions and rejections on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether a call may proceed now.
    ///
    /// An Open breaker whose recovery timeout has elapsed moves to HalfOpen
    /// and admits the call.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        let (allowed, ev) = match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let due = inner.next_attempt.is_none_or(|at| Instant::now() >= at);
                if due {
                    (true, Some(self.half_open(&mut inner)))
                } else {
                    (false, None)
                }
            }
        };
        drop(inner);
        self.emit(ev);
        allowed
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        let ev = match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count = inner.success_count.saturating_add(1);
                (inner.success_count >= self.cfg.success_threshold.max(1))
                    .then(|| self.close(&mut inner))
            }
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
                None
            }
            CircuitState::Open => None,
        };
        drop(inner);
        self.emit(ev);
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        let ev = match inner.state {
            CircuitState::Closed if inner.failure_count >= self.cfg.failure_threshold.max(1) => {
                Some(self.open(&mut inner))
            }
            CircuitState::HalfOpen => Some(self.open(&mut inner)),
            _ => None,
        };
        drop(inner);
        self.emit(ev);
    }

    /// Runs `call` through the breaker.
    ///
    /// # Errors
    /// - [`CircuitError::Open`] if the breaker rejected the call (not attempted).
    /// - [`CircuitError::Timeout`] if the call exceeded `call_timeout`.
    /// - [`CircuitError::Inner`] with the call's own error.
    ///
    /// Timeouts and call errors are recorded as failures before returning.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_execute() {
            let retry_in = self.retry_in().unwrap_or_default();
            self.emit(Some(
                Event::new(EventKind::CircuitRejected)
                    .with_component(self.cfg.name.as_str())
                    .with_delay(retry_in),
            ));
            return Err(CircuitError::Open {
                name: self.cfg.name.clone(),
                retry_in,
            });
        }

        match time::timeout(self.cfg.call_timeout, call()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
            Err(_elapsed) => {
                self.record_failure();
                Err(CircuitError::Timeout {
                    name: self.cfg.name.clone(),
                    timeout: self.cfg.call_timeout,
                })
            }
        }
    }

    /// Forces the breaker Closed and zeroes its counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let was_closed = inner.state == CircuitState::Closed;
        let ev = self.close(&mut inner);
        inner.last_failure = None;
        drop(inner);
        if !was_closed {
            self.emit(Some(ev.with_reason("manual reset")));
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        let now = Instant::now();
        CircuitSnapshot {
            name: self.cfg.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            failure_threshold: self.cfg.failure_threshold,
            success_threshold: self.cfg.success_threshold,
            since_last_failure: inner.last_failure.map(|at| now.saturating_duration_since(at)),
            retry_in: Self::remaining(&inner, now),
        }
    }

    fn retry_in(&self) -> Option<Duration> {
        Self::remaining(&self.lock(), Instant::now())
    }

    fn remaining(inner: &BreakerState, now: Instant) -> Option<Duration> {
        match inner.state {
            CircuitState::Open => inner.next_attempt.map(|at| at.saturating_duration_since(now)),
            _ => None,
        }
    }

    fn open(&self, inner: &mut BreakerState) -> Event {
        inner.state = CircuitState::Open;
        inner.success_count = 0;
        inner.next_attempt = Some(Instant::now() + self.cfg.recovery_timeout);
        Event::new(EventKind::CircuitOpened)
            .with_component(self.cfg.name.as_str())
            .with_attempt(inner.failure_count)
            .with_delay(self.cfg.recovery_timeout)
    }

    fn half_open(&self, inner: &mut BreakerState) -> Event {
        inner.state = CircuitState::HalfOpen;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt = None;
        Event::new(EventKind::CircuitHalfOpened).with_component(self.cfg.name.as_str())
    }

    fn close(&self, inner: &mut BreakerState) -> Event {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt = None;
        Event::new(EventKind::CircuitClosed).with_component(self.cfg.name.as_str())
    }

    fn emit(&self, ev: Option<Event>) {
        if let (Some(bus), Some(ev)) = (&self.bus, ev) {
            bus.publish(ev);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}
