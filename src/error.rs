//! Error types used by the faultguard runtime.
//!
//! One enum per subsystem:
//!
//! - [`GraphError`] dependency ordering failures.
//! - [`ProcessError`] child-process lifecycle failures.
//! - [`SupervisorError`] watchdog-level failures (wraps the two above).
//! - [`CircuitError`] outcome of a call gated by a circuit breaker.
//! - [`RecoveryError`] failures raised by recovery handlers and executors.
//! - [`ConfigError`] malformed configuration values.
//!
//! Every type offers `as_label()`, a short stable snake_case label for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while ordering components.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A dependency cycle was found; `component` lies on the cycle.
    #[error("dependency cycle detected at component '{component}'")]
    CycleDetected {
        /// Component that was re-entered while still in progress.
        component: String,
    },
}

impl GraphError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use faultguard::GraphError;
    ///
    /// let err = GraphError::CycleDetected { component: "db".into() };
    /// assert_eq!(err.as_label(), "graph_cycle_detected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GraphError::CycleDetected { .. } => "graph_cycle_detected",
        }
    }
}

/// # Errors produced by the process supervisor.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    /// The child process could not be launched.
    #[error("failed to spawn '{component}': {reason}")]
    SpawnFailed {
        /// Component whose process failed to start.
        component: String,
        /// OS-level reason.
        reason: String,
    },

    /// Delivering a termination signal failed.
    #[error("failed to signal '{component}': {reason}")]
    Signal {
        /// Component name.
        component: String,
        /// OS-level reason.
        reason: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::SpawnFailed { .. } => "process_spawn_failed",
            ProcessError::Signal { .. } => "process_signal_failed",
        }
    }
}

/// # Errors produced by the watchdog.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// No component with this name is registered.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// A component with this name is already registered.
    #[error("component '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Dependency ordering failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Process lifecycle failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::UnknownComponent(_) => "supervisor_unknown_component",
            SupervisorError::AlreadyRegistered(_) => "supervisor_already_registered",
            SupervisorError::Graph(e) => e.as_label(),
            SupervisorError::Process(e) => e.as_label(),
        }
    }
}

/// # Outcome of a call rejected or failed under a circuit breaker.
///
/// `E` is the error type of the protected call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CircuitError<E> {
    /// The breaker is open; the call was not attempted.
    #[error("circuit '{name}' is open; retry in {retry_in:?}")]
    Open {
        /// Breaker name.
        name: String,
        /// Time left until the breaker admits a probe.
        retry_in: Duration,
    },

    /// The call exceeded the breaker's call timeout.
    #[error("call through circuit '{name}' timed out after {timeout:?}")]
    Timeout {
        /// Breaker name.
        name: String,
        /// Configured call timeout.
        timeout: Duration,
    },

    /// The call itself failed.
    #[error("call failed: {0}")]
    Inner(E),
}

impl<E> CircuitError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use faultguard::CircuitError;
    /// use std::time::Duration;
    ///
    /// let err: CircuitError<std::io::Error> = CircuitError::Open {
    ///     name: "exchange".into(),
    ///     retry_in: Duration::from_secs(3),
    /// };
    /// assert_eq!(err.as_label(), "circuit_open");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CircuitError::Open { .. } => "circuit_open",
            CircuitError::Timeout { .. } => "circuit_timeout",
            CircuitError::Inner(_) => "circuit_call_failed",
        }
    }

    /// True if the call was never attempted.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }
}

/// # Errors raised while performing a recovery action.
///
/// Returned by [`RecoveryHandler`](crate::RecoveryHandler) and
/// [`RecoveryExecutor`](crate::RecoveryExecutor) implementations. They are
/// absorbed by the recovery system and never escape `handle_error`.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RecoveryError {
    /// The action ran but did not recover the system.
    #[error("recovery action failed: {0}")]
    Failed(String),

    /// The action exceeded the strategy timeout.
    #[error("recovery action timed out after {0:?}")]
    Timeout(Duration),

    /// The handler itself failed to choose an action.
    #[error("handler '{handler}' failed: {reason}")]
    Handler {
        /// Handler name.
        handler: String,
        /// Failure description.
        reason: String,
    },
}

impl RecoveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecoveryError::Failed(_) => "recovery_failed",
            RecoveryError::Timeout(_) => "recovery_timeout",
            RecoveryError::Handler { .. } => "recovery_handler_failed",
        }
    }
}

/// # Errors produced while reading configuration values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The restart policy string is not one of `never`, `on_failure`, `always`, `unless_stopped`.
    #[error("unknown restart policy '{0}'")]
    UnknownRestartPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_error_label_delegates() {
        let err: SupervisorError = GraphError::CycleDetected {
            component: "a".into(),
        }
        .into();
        assert_eq!(err.as_label(), "graph_cycle_detected");

        let err = SupervisorError::UnknownComponent("x".into());
        assert_eq!(err.as_label(), "supervisor_unknown_component");
        assert_eq!(err.to_string(), "unknown component 'x'");
    }

    #[test]
    fn test_circuit_error_rejected() {
        let open: CircuitError<String> = CircuitError::Open {
            name: "n".into(),
            retry_in: Duration::from_secs(1),
        };
        assert!(open.is_rejected());

        let inner: CircuitError<String> = CircuitError::Inner("boom".into());
        assert!(!inner.is_rejected());
        assert_eq!(inner.to_string(), "call failed: boom");
    }
}
