//! # Component and health-check specifications.
//!
//! [`ComponentSpec`] is the immutable description of a supervised process:
//! what to run, where, with which environment, how to restart it, how long to
//! wait when stopping it, which probes decide its health and which components
//! must be up before it.
//!
//! A spec can be created:
//! - **Explicitly** with [`ComponentSpec::builder`] (library defaults)
//! - **From config** with [`ComponentSpec::with_defaults`] (inherit [`Config`])

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::components::check::HealthCheckRef;
use crate::config::Config;
use crate::policies::RestartPolicy;

/// A health probe together with its cadence and thresholds.
#[derive(Clone)]
pub struct HealthCheckSpec {
    /// Probe name; the result is cached under `(component, name)`.
    pub name: String,
    /// The probe itself.
    pub check: HealthCheckRef,
    /// Pause before each execution.
    pub interval: Duration,
    /// Upper bound for one execution; exceeding it counts as a failure.
    pub timeout: Duration,
    /// Consecutive failures before the cached result becomes `false` (min 1).
    pub failure_threshold: u32,
    /// Consecutive successes before a failing result becomes `true` again (min 1).
    pub success_threshold: u32,
}

impl HealthCheckSpec {
    /// Creates a spec named after the probe, with library defaults
    /// (30s interval, 5s timeout, thresholds of 1).
    pub fn new(check: HealthCheckRef) -> Self {
        Self::with_defaults(check, &Config::default())
    }

    /// Creates a spec inheriting interval and timeout from `cfg`.
    pub fn with_defaults(check: HealthCheckRef, cfg: &Config) -> Self {
        Self {
            name: check.name().to_string(),
            check,
            interval: cfg.health_check_interval,
            timeout: cfg.health_check_timeout,
            failure_threshold: 1,
            success_threshold: 1,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the failure and success streak thresholds (each clamped to at least 1).
    pub fn with_thresholds(mut self, failures: u32, successes: u32) -> Self {
        self.failure_threshold = failures.max(1);
        self.success_threshold = successes.max(1);
        self
    }
}

impl fmt::Debug for HealthCheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .finish()
    }
}

/// Immutable description of a supervised component.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use faultguard::{ComponentSpec, RestartPolicy};
///
/// let api = ComponentSpec::builder("api", "/usr/bin/api-server")
///     .args(["--port", "8080"])
///     .env("RUST_LOG", "info")
///     .restart(RestartPolicy::OnFailure)
///     .max_restarts(5)
///     .restart_delay(Duration::from_secs(2))
///     .depends_on("db")
///     .build();
///
/// assert_eq!(api.name(), "api");
/// assert!(api.depends_on.contains("db"));
/// ```
#[derive(Clone, Debug)]
pub struct ComponentSpec {
    pub(crate) name: String,
    /// Executable to launch.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory (inherits the host's when `None`).
    pub cwd: Option<PathBuf>,
    /// Environment overrides merged over the host environment.
    pub env: BTreeMap<String, String>,
    /// When the watchdog restarts the component.
    pub restart: RestartPolicy,
    /// Restart budget; once spent the component stays `Unhealthy`.
    pub max_restarts: u32,
    /// Pause between stop and start during a restart.
    pub restart_delay: Duration,
    /// Time the process gets to exit after the graceful signal.
    pub stop_timeout: Duration,
    /// Time to wait for the process after the forced kill.
    pub kill_timeout: Duration,
    /// Probes deciding whether the running process is fit.
    pub health_checks: Vec<HealthCheckSpec>,
    /// Components that must be started before this one.
    pub depends_on: BTreeSet<String>,
}

impl ComponentSpec {
    /// Starts a builder populated with library defaults.
    pub fn builder(name: impl Into<String>, program: impl Into<String>) -> ComponentSpecBuilder {
        Self::with_defaults(name, program, &Config::default())
    }

    /// Starts a builder inheriting restart and stop settings from `cfg`.
    pub fn with_defaults(
        name: impl Into<String>,
        program: impl Into<String>,
        cfg: &Config,
    ) -> ComponentSpecBuilder {
        ComponentSpecBuilder {
            spec: ComponentSpec {
                name: name.into(),
                program: program.into(),
                args: Vec::new(),
                cwd: None,
                env: BTreeMap::new(),
                restart: cfg.restart,
                max_restarts: cfg.max_restarts,
                restart_delay: cfg.restart_delay,
                stop_timeout: cfg.stop_timeout,
                kill_timeout: cfg.kill_timeout,
                health_checks: Vec::new(),
                depends_on: BTreeSet::new(),
            },
        }
    }

    /// Unique component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program and arguments as a single display string.
    pub fn cmdline(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builder for [`ComponentSpec`].
#[derive(Debug)]
pub struct ComponentSpecBuilder {
    spec: ComponentSpec,
}

impl ComponentSpecBuilder {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.spec.restart = policy;
        self
    }

    pub fn max_restarts(mut self, n: u32) -> Self {
        self.spec.max_restarts = n;
        self
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.spec.restart_delay = delay;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.spec.stop_timeout = timeout;
        self
    }

    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.spec.kill_timeout = timeout;
        self
    }

    pub fn health_check(mut self, check: HealthCheckSpec) -> Self {
        self.spec.health_checks.push(check);
        self
    }

    pub fn depends_on(mut self, component: impl Into<String>) -> Self {
        self.spec.depends_on.insert(component.into());
        self
    }

    pub fn build(self) -> ComponentSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CheckError, HealthCheckFn};

    #[test]
    fn test_defaults_follow_config() {
        let cfg = Config {
            max_restarts: 7,
            restart: RestartPolicy::Always,
            ..Config::default()
        };
        let spec = ComponentSpec::with_defaults("feed", "feed-bin", &cfg).build();
        assert_eq!(spec.max_restarts, 7);
        assert_eq!(spec.restart, RestartPolicy::Always);
        assert_eq!(spec.stop_timeout, cfg.stop_timeout);
    }

    #[test]
    fn test_cmdline() {
        let spec = ComponentSpec::builder("echo", "echo").args(["a", "b"]).build();
        assert_eq!(spec.cmdline(), "echo a b");
    }

    #[test]
    fn test_health_check_thresholds_clamped() {
        let probe = HealthCheckFn::arc("p", || async { Ok::<_, CheckError>(true) });
        let spec = HealthCheckSpec::new(probe).with_thresholds(0, 3);
        assert_eq!(spec.name, "p");
        assert_eq!(spec.failure_threshold, 1);
        assert_eq!(spec.success_threshold, 3);
    }
}
