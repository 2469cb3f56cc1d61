//! # Watchdog: keeps a graph of component processes alive.
//!
//! The [`Watchdog`] owns the component registry, the process supervisor and
//! the health monitor. It drives every component through its status machine
//! and restarts components under their [`RestartPolicy`](crate::RestartPolicy)
//! and restart budget.
//!
//! ## Architecture
//! ```text
//! register(spec) ──► Registry (spec, Stopped state, restart lock, graph edges)
//!
//! start(name) ──► ProcessSupervisor::start ──► HealthMonitor::register(each check)
//!                   └─ Err ──► Unhealthy + ErrorRecoverySystem::handle_error(System/High)
//!
//! run(token) ── interval(poll_interval) ──► tick():
//!   for each monitored component (not Stopped / Restarting):
//!     process dead?   ──► restarts_on_exit(code, manually_stopped) ? restart : Stopped
//!     checks failing? ──► Healthy → Degraded → Unhealthy (+ restart) → restart again
//!     checks passing  ──► Degraded / Unhealthy → Healthy
//!   join_all(requested restarts)
//!
//! restart(name) ── try_lock(restart lock) ── busy ──► AlreadyRestarting
//!   budget spent ──► Unhealthy + RestartExhausted ──► BudgetExhausted
//!   else Restarting ──► stop ──► sleep(restart_delay) ──► start ──► restart_count += 1
//!   stopped during the delay ──► Cancelled (no start, budget untouched)
//!
//! shutdown() ──► cancel health probes ──► stop_all(reverse dependency order)
//! ```
//!
//! ## Rules
//! - Component state is only mutated here, through the registry; readers get snapshots.
//! - Restarts of one component are serialized by its lock; restarts of
//!   different components requested by the same tick run concurrently.
//! - `start_all` / `stop_all` are strictly sequential in dependency order.
//! - A failed start still consumes restart budget, so repeated launch failures
//!   end in a terminal `Unhealthy` until [`Watchdog::reset_restarts`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::join_all;
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::components::{ComponentSpec, ComponentState, ComponentStatus};
use crate::config::Config;
use crate::core::health::HealthMonitor;
use crate::core::process::{ProcessInfo, ProcessStatus, ProcessSupervisor};
use crate::core::registry::Registry;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::recovery::{ErrorContext, ErrorRecoverySystem, ErrorType, Severity};

/// Result of a [`Watchdog::restart`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// A full stop / delay / start cycle ran (the start may have failed).
    Restarted,
    /// Another restart of the same component was in flight; nothing was done.
    AlreadyRestarting,
    /// The restart budget is spent; the component is now `Unhealthy`.
    BudgetExhausted,
    /// The component was stopped while the cycle waited; nothing was started.
    Cancelled,
}

/// Aggregate health of every registered component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
    /// Components currently `Healthy`.
    pub healthy: usize,
    pub total: usize,
    /// `healthy / total * 100`, `0.0` with no components.
    pub health_percentage: f64,
    pub components: BTreeMap<String, ComponentStatus>,
    /// Time since the earliest start among components that are not `Stopped`.
    pub uptime: Option<Duration>,
}

/// Component supervisor.
pub struct Watchdog {
    cfg: Config,
    bus: Bus,
    registry: Registry,
    processes: ProcessSupervisor,
    health: HealthMonitor,
    recovery: Arc<ErrorRecoverySystem>,
}

impl Watchdog {
    /// Creates a watchdog publishing on `bus` and reporting start failures to `recovery`.
    pub fn new(cfg: Config, bus: Bus, recovery: Arc<ErrorRecoverySystem>) -> Self {
        Self {
            health: HealthMonitor::new(bus.clone()),
            cfg,
            bus,
            registry: Registry::new(),
            processes: ProcessSupervisor::new(),
            recovery,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Adds a component in the `Stopped` state.
    ///
    /// # Errors
    /// [`SupervisorError::AlreadyRegistered`] if the name is taken.
    pub async fn register(&self, spec: ComponentSpec) -> Result<(), SupervisorError> {
        let name = spec.name().to_string();
        self.registry.insert(spec).await?;
        self.bus
            .publish(Event::new(EventKind::ComponentRegistered).with_component(name.as_str()));
        Ok(())
    }

    /// Registered component names in registration order.
    pub async fn components(&self) -> Vec<String> {
        self.registry.names().await
    }

    /// Starts a component. No-op if it is `Healthy` or `Restarting`.
    ///
    /// A `Degraded` or `Unhealthy` component has its old process stopped first.
    ///
    /// # Errors
    /// - [`SupervisorError::UnknownComponent`] for an unregistered name.
    /// - [`SupervisorError::Process`] if the process could not be launched; the
    ///   component is then `Unhealthy` and the failure was reported to the
    ///   recovery system.
    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        let spec = match self.registry.spec(name).await {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(component = name, "start requested for unknown component");
                return Err(e);
            }
        };
        let state = self.registry.state(name).await?;
        match state.status {
            ComponentStatus::Healthy | ComponentStatus::Restarting => return Ok(()),
            ComponentStatus::Degraded | ComponentStatus::Unhealthy => {
                self.halt(&spec).await;
            }
            ComponentStatus::Stopped => {}
        }
        self.launch(&spec).await
    }

    /// Stops a component and marks it as manually stopped.
    ///
    /// Stop problems are logged, never returned: the component is `Stopped` afterwards.
    ///
    /// # Errors
    /// [`SupervisorError::UnknownComponent`] for an unregistered name.
    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let spec = self.registry.spec(name).await?;
        let had_process = self.halt(&spec).await;
        self.registry.update(name, |s| s.manually_stopped = true).await?;
        let changed = self.set_status(name, ComponentStatus::Stopped, "stopped").await?;
        if had_process || changed {
            self.bus
                .publish(Event::new(EventKind::ComponentStopped).with_component(name));
        }
        Ok(())
    }

    /// Runs one restart cycle unless another one is in flight or the budget is spent.
    ///
    /// A [`stop`](Self::stop) (or shutdown) that lands during `restart_delay`
    /// cancels the cycle before the process is launched again.
    ///
    /// # Errors
    /// [`SupervisorError::UnknownComponent`] for an unregistered name. A failed
    /// start inside the cycle is reported as `Ok(Restarted)` with the component
    /// left `Unhealthy`.
    pub async fn restart(&self, name: &str, reason: &str) -> Result<RestartOutcome, SupervisorError> {
        let spec = self.registry.spec(name).await?;
        let lock = self.registry.restart_lock(name).await?;
        let Ok(_guard) = lock.try_lock() else {
            tracing::debug!(component = name, reason, "restart already in progress");
            return Ok(RestartOutcome::AlreadyRestarting);
        };

        let count = self.registry.state(name).await?.restart_count;
        if count >= spec.max_restarts {
            self.set_status(name, ComponentStatus::Unhealthy, "restart budget exhausted")
                .await?;
            self.bus.publish(
                Event::new(EventKind::RestartExhausted)
                    .with_component(name)
                    .with_attempt(count)
                    .with_reason(reason),
            );
            return Ok(RestartOutcome::BudgetExhausted);
        }

        self.registry.update(name, |s| s.manually_stopped = false).await?;
        self.set_status(name, ComponentStatus::Restarting, reason).await?;
        self.bus.publish(
            Event::new(EventKind::RestartRequested)
                .with_component(name)
                .with_reason(reason)
                .with_attempt(count + 1)
                .with_delay(spec.restart_delay),
        );

        if self.halt(&spec).await {
            self.bus
                .publish(Event::new(EventKind::ComponentStopped).with_component(name));
        }
        time::sleep(spec.restart_delay).await;

        // An explicit stop during the delay wins over the restart.
        let state = self.registry.state(name).await?;
        if state.status != ComponentStatus::Restarting || state.manually_stopped {
            tracing::debug!(component = name, reason, "restart cancelled by stop");
            return Ok(RestartOutcome::Cancelled);
        }
        let started = self.launch(&spec).await;

        let restarts = self
            .registry
            .update(name, |s| {
                s.restart_count = s.restart_count.saturating_add(1);
                s.last_restart = Some(SystemTime::now());
                s.restart_count
            })
            .await?;
        if started.is_ok() {
            self.bus.publish(
                Event::new(EventKind::ComponentRestarted)
                    .with_component(name)
                    .with_attempt(restarts),
            );
        }
        Ok(RestartOutcome::Restarted)
    }

    /// Zeroes the restart counter, lifting a spent budget.
    ///
    /// The next tick restarts the component again if its policy asks for it.
    pub async fn reset_restarts(&self, name: &str) -> Result<(), SupervisorError> {
        self.registry.update(name, |s| s.restart_count = 0).await
    }

    /// Starts `names` one by one in dependency order.
    ///
    /// Continues past individual failures.
    ///
    /// # Errors
    /// [`SupervisorError::Graph`] (nothing started) on a dependency cycle,
    /// otherwise the first start error encountered.
    pub async fn start_all<S: AsRef<str>>(&self, names: &[S]) -> Result<(), SupervisorError> {
        let order = self.registry.start_order(names).await?;
        let mut first_err = None;
        for name in &order {
            if let Err(e) = self.start(name).await {
                tracing::warn!(component = %name, error = %e, "component failed to start");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Stops `names` one by one in reverse dependency order.
    ///
    /// # Errors
    /// Only [`SupervisorError::Graph`] (nothing stopped) on a dependency cycle.
    pub async fn stop_all<S: AsRef<str>>(&self, names: &[S]) -> Result<(), SupervisorError> {
        let order = self.registry.stop_order(names).await?;
        self.stop_sequence(&order).await;
        Ok(())
    }

    /// One reconciliation pass over every monitored component.
    pub async fn tick(&self) {
        let mut restarts: Vec<(String, String)> = Vec::new();

        for name in self.registry.names().await {
            let (Ok(spec), Ok(state)) = (
                self.registry.spec(&name).await,
                self.registry.state(&name).await,
            ) else {
                continue;
            };
            if !state.is_monitored() {
                continue;
            }
            let exhausted = state.status == ComponentStatus::Unhealthy
                && state.restart_count >= spec.max_restarts;
            if exhausted {
                continue;
            }

            let code = match self.processes.poll(&name).await {
                ProcessStatus::Running => {
                    if let Some(reason) = self.reconcile_health(&spec, &state).await {
                        restarts.push((name, reason));
                    }
                    continue;
                }
                ProcessStatus::Exited { code } => code,
                ProcessStatus::NotStarted => None,
            };

            self.bus.publish(
                Event::new(EventKind::ProcessExited)
                    .with_component(name.as_str())
                    .with_exit_code(code),
            );
            let reason = match code {
                Some(c) => format!("process exited with code {c}"),
                None => "process terminated".to_string(),
            };
            if spec.restart.restarts_on_exit(code, state.manually_stopped) {
                restarts.push((name, reason));
            } else {
                self.halt(&spec).await;
                let _ = self.set_status(&name, ComponentStatus::Stopped, &reason).await;
            }
        }

        if restarts.is_empty() {
            return;
        }
        let results = join_all(restarts.iter().map(|(name, reason)| self.restart(name, reason))).await;
        for ((name, reason), res) in restarts.iter().zip(results) {
            match res {
                Ok(outcome) => tracing::debug!(component = %name, reason = %reason, ?outcome, "restart handled"),
                Err(e) => tracing::warn!(component = %name, error = %e, "restart failed"),
            }
        }
    }

    /// Runs [`tick`](Self::tick) every `poll_interval` until `token` is cancelled.
    ///
    /// A tick in progress always completes.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = time::interval(self.cfg.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; give fresh components one interval.
        ticker.tick().await;

        loop {
            select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    /// Cancels every health probe and stops all components in reverse dependency order.
    ///
    /// Falls back to reverse registration order if the graph has a cycle.
    pub async fn shutdown(&self) {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.health.shutdown();

        let names = self.registry.names().await;
        let order = match self.registry.stop_order(&names).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "stop order unavailable; stopping in reverse registration order");
                names.into_iter().rev().collect()
            }
        };
        self.stop_sequence(&order).await;
        self.processes
            .stop_all_handles(self.cfg.stop_timeout, self.cfg.kill_timeout)
            .await;
        self.bus.publish(Event::new(EventKind::ShutdownCompleted));
    }

    pub async fn status(&self, name: &str) -> Result<ComponentStatus, SupervisorError> {
        Ok(self.registry.state(name).await?.status)
    }

    pub async fn all_statuses(&self) -> BTreeMap<String, ComponentStatus> {
        self.registry
            .states()
            .await
            .into_iter()
            .map(|(name, s)| (name, s.status))
            .collect()
    }

    /// Snapshot of a component's full state.
    pub async fn state(&self, name: &str) -> Result<ComponentState, SupervisorError> {
        let state = self.registry.state(name).await?;
        Ok(state)
    }

    /// Best-effort resource snapshot of a component's process.
    pub async fn process_info(&self, name: &str) -> Result<ProcessInfo, SupervisorError> {
        self.registry.spec(name).await?;
        Ok(self.processes.info(name).await)
    }

    pub async fn system_health(&self) -> SystemHealth {
        let states = self.registry.states().await;
        let total = states.len();
        let healthy = states
            .values()
            .filter(|s| s.status == ComponentStatus::Healthy)
            .count();
        let earliest = states
            .values()
            .filter(|s| s.status != ComponentStatus::Stopped)
            .filter_map(|s| s.started_at)
            .min();

        SystemHealth {
            healthy,
            total,
            health_percentage: if total == 0 {
                0.0
            } else {
                healthy as f64 / total as f64 * 100.0
            },
            components: states.into_iter().map(|(n, s)| (n, s.status)).collect(),
            uptime: earliest.and_then(|at| SystemTime::now().duration_since(at).ok()),
        }
    }

    /// Applies the health verdict of a running component.
    ///
    /// Returns a restart reason when the component should be restarted.
    async fn reconcile_health(&self, spec: &ComponentSpec, state: &ComponentState) -> Option<String> {
        let name = spec.name();
        self.mirror_check_counters(name).await;

        if self.health.is_healthy(name, &spec.health_checks).await {
            if matches!(
                state.status,
                ComponentStatus::Degraded | ComponentStatus::Unhealthy
            ) {
                let _ = self
                    .set_status(name, ComponentStatus::Healthy, "health checks passing")
                    .await;
            }
            return None;
        }

        let wants_restart = spec.restart.restarts_on_unhealthy();
        match state.status {
            ComponentStatus::Healthy => {
                let _ = self
                    .set_status(name, ComponentStatus::Degraded, "health checks failing")
                    .await;
                None
            }
            ComponentStatus::Degraded => {
                let _ = self
                    .set_status(name, ComponentStatus::Unhealthy, "health checks failing")
                    .await;
                wants_restart.then(|| "health checks failing".to_string())
            }
            ComponentStatus::Unhealthy => wants_restart.then(|| "still unhealthy".to_string()),
            ComponentStatus::Stopped | ComponentStatus::Restarting => None,
        }
    }

    async fn mirror_check_counters(&self, name: &str) {
        let counters = self.health.check_counters(name).await;
        let _ = self
            .registry
            .update(name, |s| {
                s.check_failures = counters
                    .iter()
                    .map(|(check, c)| (check.clone(), c.failures))
                    .collect();
                s.check_successes = counters
                    .iter()
                    .map(|(check, c)| (check.clone(), c.successes))
                    .collect();
            })
            .await;
    }

    /// Launches the process and registers its health checks.
    async fn launch(&self, spec: &ComponentSpec) -> Result<(), SupervisorError> {
        let name = spec.name();
        self.bus
            .publish(Event::new(EventKind::ComponentStarting).with_component(name));

        match self.processes.start(spec).await {
            Ok(pid) => {
                for check in &spec.health_checks {
                    self.health.register(name, check.clone()).await;
                }
                self.registry
                    .update(name, |s| {
                        s.pid = Some(pid);
                        s.started_at = Some(SystemTime::now());
                        s.manually_stopped = false;
                        s.check_failures.clear();
                        s.check_successes.clear();
                    })
                    .await?;
                self.set_status(name, ComponentStatus::Healthy, "started").await?;
                self.bus.publish(
                    Event::new(EventKind::ComponentStarted)
                        .with_component(name)
                        .with_pid(pid),
                );
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.registry.update(name, |s| s.pid = None).await?;
                self.set_status(name, ComponentStatus::Unhealthy, &reason).await?;
                self.bus.publish(
                    Event::new(EventKind::ComponentStartFailed)
                        .with_component(name)
                        .with_reason(reason.as_str()),
                );

                let ctx = ErrorContext::new(
                    ErrorType::System,
                    Severity::High,
                    format!("failed to start component '{name}': {reason}"),
                )
                .with_component(name)
                .with_metadata("error", e.as_label())
                .with_cause(e.clone());
                self.recovery.handle_error(ctx).await;
                Err(e.into())
            }
        }
    }

    /// Unregisters health checks and stops the process, leaving the status alone.
    ///
    /// Returns `true` if a process was tracked.
    async fn halt(&self, spec: &ComponentSpec) -> bool {
        let name = spec.name();
        self.health.unregister(name).await;
        let had_process = self
            .processes
            .stop(name, spec.stop_timeout, spec.kill_timeout)
            .await;
        let _ = self
            .registry
            .update(name, |s| {
                s.pid = None;
                if had_process {
                    s.stopped_at = Some(SystemTime::now());
                }
            })
            .await;
        had_process
    }

    async fn stop_sequence(&self, order: &[String]) {
        for name in order {
            if let Err(e) = self.stop(name).await {
                tracing::warn!(component = %name, error = %e, "failed to stop component");
            }
        }
    }

    /// Sets the status and publishes `StatusChanged` if it changed.
    ///
    /// Returns whether the status changed.
    async fn set_status(
        &self,
        name: &str,
        to: ComponentStatus,
        reason: &str,
    ) -> Result<bool, SupervisorError> {
        let from = self
            .registry
            .update(name, |s| std::mem::replace(&mut s.status, to))
            .await?;
        if from == to {
            return Ok(false);
        }
        self.bus.publish(
            Event::new(EventKind::StatusChanged)
                .with_component(name)
                .with_transition(from, to)
                .with_reason(reason),
        );
        Ok(true)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::components::{CheckError, HealthCheckFn, HealthCheckSpec};
    use crate::policies::RestartPolicy;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn watchdog() -> Watchdog {
        let cfg = Config::default();
        let bus = Bus::new(256);
        let recovery = Arc::new(ErrorRecoverySystem::new(&cfg).with_bus(bus.clone()));
        Watchdog::new(cfg, bus, recovery)
    }

    fn sleeper(name: &str) -> crate::components::ComponentSpecBuilder {
        ComponentSpec::builder(name, "sleep")
            .arg("30")
            .restart_delay(Duration::from_millis(10))
            .stop_timeout(Duration::from_secs(2))
            .kill_timeout(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let wd = watchdog();
        wd.register(sleeper("svc").build()).await.unwrap();
        assert_eq!(wd.status("svc").await.unwrap(), ComponentStatus::Stopped);

        wd.start("svc").await.unwrap();
        let state = wd.state("svc").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Healthy);
        assert!(state.pid.is_some());
        assert!(state.started_at.is_some());
        assert_eq!(wd.process_info("svc").await.unwrap().pid, state.pid);

        // starting a healthy component is a no-op
        wd.start("svc").await.unwrap();
        assert_eq!(wd.state("svc").await.unwrap().pid, state.pid);

        wd.stop("svc").await.unwrap();
        let state = wd.state("svc").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Stopped);
        assert!(state.manually_stopped);
        assert!(state.pid.is_none());
        assert!(state.stopped_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_and_unknown() {
        let wd = watchdog();
        wd.register(sleeper("svc").build()).await.unwrap();
        let err = wd.register(sleeper("svc").build()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRegistered(_)));
        assert!(matches!(
            wd.start("ghost").await,
            Err(SupervisorError::UnknownComponent(_))
        ));
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let cfg = Config::default();
        let recovery = Arc::new(ErrorRecoverySystem::new(&cfg));
        let wd = Watchdog::new(cfg, Bus::new(64), Arc::clone(&recovery));
        wd.register(ComponentSpec::builder("broken", "/nonexistent/faultguard-bin").build())
            .await
            .unwrap();

        let err = wd.start("broken").await.unwrap_err();
        assert_eq!(err.as_label(), "process_spawn_failed");
        assert_eq!(wd.status("broken").await.unwrap(), ComponentStatus::Unhealthy);

        let incidents = recovery.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].context.error_type, ErrorType::System);
        assert_eq!(incidents[0].context.severity, Severity::High);
        assert_eq!(incidents[0].context.component.as_deref(), Some("broken"));
        assert!(incidents[0].context.cause.is_some());
    }

    #[tokio::test]
    async fn test_failing_checks_degrade_then_restart() {
        let wd = watchdog();
        let up = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&up);
        let probe = HealthCheckFn::arc("ping", move || {
            let flag = Arc::clone(&flag);
            async move { Ok::<_, CheckError>(flag.load(Ordering::SeqCst)) }
        });
        let spec = sleeper("api")
            .restart(RestartPolicy::OnFailure)
            .max_restarts(1)
            .health_check(
                HealthCheckSpec::new(probe)
                    .with_interval(Duration::from_millis(20))
                    .with_timeout(Duration::from_millis(100)),
            )
            .build();
        wd.register(spec).await.unwrap();
        wd.start("api").await.unwrap();

        time::sleep(Duration::from_millis(150)).await;
        wd.tick().await;
        assert_eq!(wd.status("api").await.unwrap(), ComponentStatus::Degraded);
        assert!(wd.state("api").await.unwrap().check_failures["ping"] >= 1);

        wd.tick().await;
        let state = wd.state("api").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Healthy);
        assert_eq!(state.restart_count, 1);
        assert!(state.last_restart.is_some());

        up.store(true, Ordering::SeqCst);
        wd.shutdown().await;
        assert_eq!(wd.status("api").await.unwrap(), ComponentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_clean_exit_without_restart_stops() {
        let wd = watchdog();
        wd.register(
            ComponentSpec::builder("job", "sh")
                .args(["-c", "exit 0"])
                .restart(RestartPolicy::OnFailure)
                .build(),
        )
        .await
        .unwrap();
        wd.start("job").await.unwrap();

        time::sleep(Duration::from_millis(200)).await;
        wd.tick().await;
        let state = wd.state("job").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Stopped);
        assert_eq!(state.restart_count, 0);
        assert!(!state.manually_stopped);
    }

    #[tokio::test]
    async fn test_system_health() {
        let wd = watchdog();
        assert_eq!(wd.system_health().await.health_percentage, 0.0);

        wd.register(sleeper("a").build()).await.unwrap();
        wd.register(sleeper("b").build()).await.unwrap();
        wd.start("a").await.unwrap();

        let health = wd.system_health().await;
        assert_eq!(health.healthy, 1);
        assert_eq!(health.total, 2);
        assert_eq!(health.health_percentage, 50.0);
        assert_eq!(health.components["b"], ComponentStatus::Stopped);
        assert!(health.uptime.is_some());

        wd.shutdown().await;
        assert!(wd.system_health().await.uptime.is_none());
    }

    #[tokio::test]
    async fn test_dependencies_start_first_and_stop_last() {
        let wd = watchdog();
        let mut rx = wd.bus().subscribe();
        wd.register(sleeper("api").depends_on("db").build()).await.unwrap();
        wd.register(sleeper("db").build()).await.unwrap();

        wd.start_all(&["api", "db"]).await.unwrap();
        wd.stop_all(&["api", "db"]).await.unwrap();

        let mut started = Vec::new();
        let mut stopped = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            let name = ev.component.as_deref().unwrap_or_default().to_string();
            match ev.kind {
                EventKind::ComponentStarted => started.push(name),
                EventKind::ComponentStopped => stopped.push(name),
                _ => {}
            }
        }
        assert_eq!(started, vec!["db", "api"]);
        assert_eq!(stopped, vec!["api", "db"]);
    }

    #[tokio::test]
    async fn test_crash_loop_exhausts_budget() {
        let wd = watchdog();
        let mut rx = wd.bus().subscribe();
        wd.register(
            ComponentSpec::builder("worker", "sh")
                .args(["-c", "exit 1"])
                .restart(RestartPolicy::OnFailure)
                .max_restarts(2)
                .restart_delay(Duration::from_millis(10))
                .build(),
        )
        .await
        .unwrap();
        wd.start("worker").await.unwrap();

        for _ in 0..4 {
            time::sleep(Duration::from_millis(200)).await;
            wd.tick().await;
        }

        let state = wd.state("worker").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Unhealthy);
        assert_eq!(state.restart_count, 2);

        let mut exhausted = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::RestartExhausted {
                exhausted += 1;
            }
        }
        assert_eq!(exhausted, 1);
    }

    #[tokio::test]
    async fn test_concurrent_restarts_run_once() {
        let wd = watchdog();
        wd.register(sleeper("svc").restart_delay(Duration::from_millis(100)).build())
            .await
            .unwrap();
        wd.start("svc").await.unwrap();

        let (a, b) = tokio::join!(wd.restart("svc", "first"), wd.restart("svc", "second"));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == RestartOutcome::AlreadyRestarting);
        assert_eq!(
            outcomes,
            vec![RestartOutcome::Restarted, RestartOutcome::AlreadyRestarting]
        );

        let state = wd.state("svc").await.unwrap();
        assert_eq!(state.restart_count, 1);
        assert_eq!(state.status, ComponentStatus::Healthy);
        wd.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_replaces_unhealthy_process() {
        let wd = watchdog();
        wd.register(sleeper("svc").max_restarts(0).build()).await.unwrap();
        wd.start("svc").await.unwrap();
        let old_pid = wd.state("svc").await.unwrap().pid;

        // budget 0: the restart marks it Unhealthy and leaves the old process alone
        assert_eq!(
            wd.restart("svc", "health checks failing").await.unwrap(),
            RestartOutcome::BudgetExhausted
        );
        assert_eq!(wd.status("svc").await.unwrap(), ComponentStatus::Unhealthy);
        assert_eq!(wd.state("svc").await.unwrap().pid, old_pid);

        wd.start("svc").await.unwrap();
        let state = wd.state("svc").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Healthy);
        assert!(state.pid.is_some());
        assert_ne!(state.pid, old_pid);
        wd.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_during_restart_delay_wins() {
        let wd = watchdog();
        wd.register(sleeper("svc").restart_delay(Duration::from_millis(400)).build())
            .await
            .unwrap();
        wd.start("svc").await.unwrap();

        let (outcome, ()) = tokio::join!(wd.restart("svc", "operator"), async {
            time::sleep(Duration::from_millis(150)).await;
            wd.stop("svc").await.unwrap();
        });
        assert_eq!(outcome.unwrap(), RestartOutcome::Cancelled);

        let state = wd.state("svc").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Stopped);
        assert!(state.manually_stopped);
        assert!(state.pid.is_none());
        assert_eq!(state.restart_count, 0);
        assert!(!wd.processes.is_running("svc").await);
    }

    #[tokio::test]
    async fn test_shutdown_during_restart_delay_leaves_nothing_running() {
        let wd = watchdog();
        wd.register(sleeper("svc").restart_delay(Duration::from_millis(400)).build())
            .await
            .unwrap();
        wd.start("svc").await.unwrap();

        let (outcome, ()) = tokio::join!(wd.restart("svc", "operator"), async {
            time::sleep(Duration::from_millis(150)).await;
            wd.shutdown().await;
        });
        assert_eq!(outcome.unwrap(), RestartOutcome::Cancelled);
        assert_eq!(wd.status("svc").await.unwrap(), ComponentStatus::Stopped);
        assert!(!wd.processes.is_running("svc").await);
    }

    #[tokio::test]
    async fn test_always_restarts_after_clean_exit() {
        let wd = watchdog();
        let mut rx = wd.bus().subscribe();
        wd.register(
            ComponentSpec::builder("job", "sh")
                .args(["-c", "exit 0"])
                .restart(RestartPolicy::Always)
                .max_restarts(5)
                .restart_delay(Duration::from_millis(10))
                .build(),
        )
        .await
        .unwrap();
        wd.start("job").await.unwrap();

        time::sleep(Duration::from_millis(200)).await;
        wd.tick().await;
        assert_eq!(wd.state("job").await.unwrap().restart_count, 1);

        let mut exit_codes = Vec::new();
        let mut restarted = false;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::ProcessExited => exit_codes.push(ev.exit_code),
                EventKind::ComponentRestarted => restarted = true,
                _ => {}
            }
        }
        assert_eq!(exit_codes, vec![Some(0)]);
        assert!(restarted);
        wd.shutdown().await;
    }

    #[tokio::test]
    async fn test_never_stops_after_crash() {
        let wd = watchdog();
        wd.register(
            ComponentSpec::builder("job", "sh")
                .args(["-c", "exit 3"])
                .restart(RestartPolicy::Never)
                .build(),
        )
        .await
        .unwrap();
        wd.start("job").await.unwrap();

        time::sleep(Duration::from_millis(200)).await;
        wd.tick().await;
        let state = wd.state("job").await.unwrap();
        assert_eq!(state.status, ComponentStatus::Stopped);
        assert_eq!(state.restart_count, 0);
        assert!(!state.manually_stopped);
        assert!(state.pid.is_none());
    }

    #[tokio::test]
    async fn test_reset_restarts_lifts_budget() {
        let wd = watchdog();
        wd.register(sleeper("svc").max_restarts(0).build())
            .await
            .unwrap();
        wd.start("svc").await.unwrap();

        let outcome = wd.restart("svc", "manual").await.unwrap();
        assert_eq!(outcome, RestartOutcome::BudgetExhausted);
        assert_eq!(wd.status("svc").await.unwrap(), ComponentStatus::Unhealthy);

        wd.stop("svc").await.unwrap();
        wd.reset_restarts("svc").await.unwrap();
        assert_eq!(wd.state("svc").await.unwrap().restart_count, 0);
    }
}
