//! # Restart policies for supervised components.
//!
//! [`RestartPolicy`] determines whether the watchdog brings a component back after
//! its process exits or its health checks keep failing.
//!
//! ```text
//!                    process exited        unhealthy      after manual stop()
//! Never              → Stopped             → stay         → Stopped
//! OnFailure          → restart if code≠0   → restart      → Stopped
//! Always             → restart             → restart      → Stopped
//! UnlessStopped      → restart             → restart      → Stopped (sticky)
//! ```
//!
//! A manual `stop()` marks the component `Stopped`, which the monitoring loop
//! skips regardless of policy. `UnlessStopped` additionally refuses to restart a
//! process whose last transition was a manual stop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Policy controlling whether a component is restarted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Never restart automatically.
    Never,
    /// Restart after a crash (non-zero exit) or persistent health failure (default).
    #[default]
    OnFailure,
    /// Restart whenever the process is found dead, including clean exits.
    Always,
    /// Like [`RestartPolicy::Always`], but not after an explicit manual stop.
    UnlessStopped,
}

impl RestartPolicy {
    /// Decides whether a process that exited with `exit_code` should be restarted.
    ///
    /// `exit_code` is `None` when the process was killed by a signal.
    pub fn restarts_on_exit(&self, exit_code: Option<i32>, manually_stopped: bool) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure => exit_code != Some(0),
            RestartPolicy::Always => true,
            RestartPolicy::UnlessStopped => !manually_stopped,
        }
    }

    /// Decides whether a component that stays unhealthy should be restarted.
    pub fn restarts_on_unhealthy(&self) -> bool {
        !matches!(self, RestartPolicy::Never)
    }

    /// Stable snake_case name, identical to the accepted config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "never",
            RestartPolicy::OnFailure => "on_failure",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless_stopped",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestartPolicy {
    type Err = ConfigError;

    /// Parses `never`, `on_failure`, `always` or `unless_stopped` (case-insensitive,
    /// `-` accepted in place of `_`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "never" | "no" => Ok(RestartPolicy::Never),
            "on_failure" => Ok(RestartPolicy::OnFailure),
            "always" => Ok(RestartPolicy::Always),
            "unless_stopped" => Ok(RestartPolicy::UnlessStopped),
            _ => Err(ConfigError::UnknownRestartPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!("never".parse(), Ok(RestartPolicy::Never));
        assert_eq!("on_failure".parse(), Ok(RestartPolicy::OnFailure));
        assert_eq!("On-Failure".parse(), Ok(RestartPolicy::OnFailure));
        assert_eq!("always".parse(), Ok(RestartPolicy::Always));
        assert_eq!("unless_stopped".parse(), Ok(RestartPolicy::UnlessStopped));
        assert_eq!(
            "sometimes".parse::<RestartPolicy>(),
            Err(ConfigError::UnknownRestartPolicy("sometimes".into()))
        );
    }

    #[test]
    fn test_exit_decisions() {
        assert!(!RestartPolicy::Never.restarts_on_exit(Some(1), false));
        assert!(RestartPolicy::OnFailure.restarts_on_exit(Some(1), false));
        assert!(RestartPolicy::OnFailure.restarts_on_exit(None, false));
        assert!(!RestartPolicy::OnFailure.restarts_on_exit(Some(0), false));
        assert!(RestartPolicy::Always.restarts_on_exit(Some(0), true));
        assert!(RestartPolicy::UnlessStopped.restarts_on_exit(Some(0), false));
        assert!(!RestartPolicy::UnlessStopped.restarts_on_exit(Some(1), true));
    }

    #[test]
    fn test_unhealthy_decisions() {
        assert!(!RestartPolicy::Never.restarts_on_unhealthy());
        assert!(RestartPolicy::OnFailure.restarts_on_unhealthy());
        assert!(RestartPolicy::UnlessStopped.restarts_on_unhealthy());
    }
}
