//! # Per-component runtime state.
//!
//! ```text
//! Stopped ──start()──► Healthy ──fail──► Degraded ──fail──► Unhealthy ──restart()──► Restarting
//!                         ▲                  │                  │                      │
//!                         └─────recovers─────┴──────────────────┘◄──start fails────────┤
//!                         ▲                                                            │
//!                         └───────────────────────────start ok─────────────────────────┘
//!
//! Any running status ──stop() / exit without restart──► Stopped
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

/// Status of a supervised component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Not running; skipped by the monitoring loop.
    Stopped,
    /// Running and passing all health checks.
    Healthy,
    /// Running, one tick of failing health checks observed.
    Degraded,
    /// Failing persistently, failed to start, or restart budget spent.
    Unhealthy,
    /// A restart cycle is in progress; skipped by the monitoring loop.
    Restarting,
}

impl ComponentStatus {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Stopped => "stopped",
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
            ComponentStatus::Restarting => "restarting",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a component's mutable state.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentState {
    pub status: ComponentStatus,
    pub pid: Option<u32>,
    pub started_at: Option<SystemTime>,
    pub stopped_at: Option<SystemTime>,
    pub restart_count: u32,
    pub last_restart: Option<SystemTime>,
    /// Set by an explicit `stop()`, cleared by the next successful `start()`.
    pub manually_stopped: bool,
    /// Current consecutive-failure streak per health check.
    pub check_failures: BTreeMap<String, u32>,
    /// Current consecutive-success streak per health check.
    pub check_successes: BTreeMap<String, u32>,
}

impl ComponentState {
    /// Fresh state of a just-registered component.
    pub fn new() -> Self {
        Self {
            status: ComponentStatus::Stopped,
            pid: None,
            started_at: None,
            stopped_at: None,
            restart_count: 0,
            last_restart: None,
            manually_stopped: false,
            check_failures: BTreeMap::new(),
            check_successes: BTreeMap::new(),
        }
    }

    /// True while the component has a live process the monitoring loop inspects.
    pub fn is_monitored(&self) -> bool {
        !matches!(
            self.status,
            ComponentStatus::Stopped | ComponentStatus::Restarting
        )
    }
}

impl Default for ComponentState {
    fn default() -> Self {
        Self::new()
    }
}
