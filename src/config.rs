//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the watchdog, event bus and
//! recovery system.
//!
//! Config is used in two ways:
//! 1. **Runtime creation**: `Runtime::builder(config)`
//! 2. **Component defaults**: `ComponentSpec::with_defaults(name, program, &config)`
//!
//! ## Sentinel values
//! - `max_incidents = 0` → unbounded incident log

use std::time::Duration;

use crate::policies::RestartPolicy;

/// Global configuration for the fault-tolerance runtime.
///
/// Defines:
/// - **Monitoring**: how often the watchdog reconciles component state
/// - **Event system**: bus capacity for event delivery
/// - **Incident log**: how many reports are retained
/// - **Component defaults**: restart policy, restart budget, stop/kill timeouts, health-check cadence
///
/// All fields are public; prefer the accessors over sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Interval between two monitoring-loop ticks.
    pub poll_interval: Duration,

    /// Capacity of the event bus broadcast ring buffer (min 1, clamped).
    pub bus_capacity: usize,

    /// Number of incident reports kept in memory (`0` = unbounded).
    ///
    /// When full, the oldest report is evicted.
    pub max_incidents: usize,

    /// Default restart policy for components.
    pub restart: RestartPolicy,

    /// Default restart budget for components.
    pub max_restarts: u32,

    /// Default pause between stopping and starting during a restart.
    pub restart_delay: Duration,

    /// Default time a process gets to exit after the graceful signal.
    pub stop_timeout: Duration,

    /// Default time to wait for the process after the forced kill.
    pub kill_timeout: Duration,

    /// Default interval between two executions of a health check.
    pub health_check_interval: Duration,

    /// Default upper bound for a single health-check execution.
    pub health_check_timeout: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the incident log capacity as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` reports retained
    #[inline]
    pub fn incident_capacity(&self) -> Option<usize> {
        if self.max_incidents == 0 {
            None
        } else {
            Some(self.max_incidents)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `poll_interval = 10s`
    /// - `bus_capacity = 1024`
    /// - `max_incidents = 10_000`
    /// - `restart = OnFailure`, `max_restarts = 3`, `restart_delay = 5s`
    /// - `stop_timeout = 10s`, `kill_timeout = 5s`
    /// - `health_check_interval = 30s`, `health_check_timeout = 5s`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            bus_capacity: 1024,
            max_incidents: 10_000,
            restart: RestartPolicy::default(),
            max_restarts: 3,
            restart_delay: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
        }
    }
}
