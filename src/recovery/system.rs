//! # ErrorRecoverySystem: route, recover, record.
//!
//! ```text
//! handle_error(ctx)
//!   ├─► find_handler(): custom handlers (registration order), then built-ins
//!   │       none → actions [Escalate], success = false
//!   ├─► run_strategy(strategy for ctx.error_type, or a single-attempt one)
//!   │       attempt 0..=max_retries:
//!   │         action = handler.choose_action(ctx, attempt)   (Err → Escalate, fail)
//!   │         terminal (Ignore / Escalate / SafeMode) → success
//!   │         executor.execute(action) under strategy.timeout
//!   │             Ok  → success
//!   │             Err → sleep(backoff.next(attempt)), next attempt
//!   │       exhausted → fallback strategy (its own action, handler not asked) or fail
//!   └─► IncidentLog::push(report) + publish IncidentRecorded
//! ```
//!
//! ## Rules
//! - `handle_error` never fails; every outcome is a report.
//! - Locks (strategies, log, breakers) are `std::sync` and never held across `.await`.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::config::Config;
use crate::error::RecoveryError;
use crate::events::{Bus, Event, EventKind};
use crate::recovery::context::{ErrorContext, ErrorType, Severity};
use crate::recovery::executor::{NoopExecutor, RecoveryExecutor};
use crate::recovery::handler::{RecoveryHandler, RecoveryHandlerRef, builtin_handlers};
use crate::recovery::incident::{IncidentLog, IncidentMetadata, IncidentReport, IncidentStatistics};
use crate::recovery::strategy::{RecoveryAction, RecoveryStrategy, default_strategies};

#[derive(Default)]
struct Outcome {
    actions: Vec<RecoveryAction>,
    attempts: u32,
    last_error: Option<String>,
}

/// Classifies errors, runs recovery strategies and keeps the incident log.
pub struct ErrorRecoverySystem {
    custom: Vec<RecoveryHandlerRef>,
    builtin: Vec<RecoveryHandlerRef>,
    strategies: RwLock<HashMap<ErrorType, RecoveryStrategy>>,
    executor: Arc<dyn RecoveryExecutor>,
    log: Mutex<IncidentLog>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    bus: Option<Bus>,
}

impl ErrorRecoverySystem {
    /// System with the built-in handlers, default strategies and [`NoopExecutor`].
    pub fn new(cfg: &Config) -> Self {
        Self {
            custom: Vec::new(),
            builtin: builtin_handlers(),
            strategies: RwLock::new(default_strategies()),
            executor: Arc::new(NoopExecutor),
            log: Mutex::new(IncidentLog::new(cfg.incident_capacity())),
            breakers: Mutex::new(HashMap::new()),
            bus: None,
        }
    }

    /// Publishes incidents (and transitions of breakers created afterwards) on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Adds a handler consulted before the built-ins.
    pub fn with_handler(mut self, handler: impl RecoveryHandler) -> Self {
        self.custom.push(Arc::new(handler));
        self
    }

    /// Replaces the executor performing non-terminal actions.
    pub fn with_executor(mut self, executor: impl RecoveryExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Sets (or replaces) the strategy for `error_type`.
    pub fn set_strategy(&self, error_type: ErrorType, strategy: RecoveryStrategy) {
        self.strategies
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(error_type, strategy);
    }

    pub fn strategy(&self, error_type: ErrorType) -> Option<RecoveryStrategy> {
        self.strategies
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&error_type)
            .cloned()
    }

    /// Runs the recovery pipeline for `ctx` and records the outcome.
    pub async fn handle_error(&self, ctx: ErrorContext) -> IncidentReport {
        let started = Instant::now();
        let mut out = Outcome::default();

        let handler = self.find_handler(&ctx);
        let success = match &handler {
            None => {
                out.actions.push(RecoveryAction::Escalate);
                out.last_error = Some(format!("no handler for {} errors", ctx.error_type));
                false
            }
            Some(h) => {
                let strategy = self
                    .strategy(ctx.error_type)
                    .unwrap_or_else(|| RecoveryStrategy::new(RecoveryAction::Escalate));
                self.run_strategy(h.as_ref(), &ctx, &strategy, &mut out).await
            }
        };

        let report = IncidentReport {
            id: Uuid::new_v4(),
            context: ctx,
            actions: out.actions,
            resolved_at: SystemTime::now(),
            success,
            metadata: IncidentMetadata {
                handler: handler.map(|h| h.name().to_string()),
                attempts: out.attempts,
                elapsed_ms: started.elapsed().as_millis().min(u64::MAX as u128) as u64,
                last_error: out.last_error,
            },
        };
        self.record(&report);
        report
    }

    /// Runs `fut`; if it fails, reports the error under `component` and returns it unchanged.
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use faultguard::{Config, ErrorRecoverySystem, ErrorType, Severity};
    ///
    /// let recovery = ErrorRecoverySystem::new(&Config::default());
    /// let res: Result<(), String> = recovery
    ///     .report_errors("risk-engine", ErrorType::Risk, Severity::High, async {
    ///         Err("exposure limit breached".to_string())
    ///     })
    ///     .await;
    ///
    /// assert!(res.is_err());
    /// assert_eq!(recovery.incident_statistics().total_incidents, 1);
    /// # }
    /// ```
    pub async fn report_errors<Fut, T, E>(
        &self,
        component: &str,
        error_type: ErrorType,
        severity: Severity,
        fut: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match fut.await {
            Ok(v) => Ok(v),
            Err(e) => {
                let ctx = ErrorContext::new(error_type, severity, e.to_string()).with_component(component);
                self.handle_error(ctx).await;
                Err(e)
            }
        }
    }

    /// Every retained report, oldest first.
    pub fn incidents(&self) -> Vec<IncidentReport> {
        self.lock_log().all()
    }

    /// The `n` newest reports, oldest first.
    pub fn recent_incidents(&self, n: usize) -> Vec<IncidentReport> {
        self.lock_log().recent(n)
    }

    pub fn incident_statistics(&self) -> IncidentStatistics {
        self.lock_log().statistics()
    }

    /// Returns the breaker called `name`, creating it from `cfg` on first use.
    ///
    /// `cfg = None` uses [`CircuitBreakerConfig::new`] defaults. The name always
    /// wins over `cfg.name`. Later calls return the existing breaker and ignore `cfg`.
    pub fn circuit_breaker(
        &self,
        name: &str,
        cfg: Option<CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|p| p.into_inner());
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let mut cfg = cfg.unwrap_or_else(|| CircuitBreakerConfig::new(name));
            cfg.name = name.to_string();
            let mut cb = CircuitBreaker::new(cfg);
            if let Some(bus) = &self.bus {
                cb = cb.with_bus(bus.clone());
            }
            Arc::new(cb)
        });
        Arc::clone(breaker)
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn circuit_breakers(&self) -> Vec<CircuitSnapshot> {
        let breakers: Vec<_> = self
            .breakers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        let mut snaps: Vec<_> = breakers.iter().map(|cb| cb.snapshot()).collect();
        snaps.sort_by(|a, b| a.name.cmp(&b.name));
        snaps
    }

    fn find_handler(&self, ctx: &ErrorContext) -> Option<RecoveryHandlerRef> {
        self.custom
            .iter()
            .chain(self.builtin.iter())
            .find(|h| h.can_handle(ctx))
            .cloned()
    }

    /// Runs `strategy` and then its fallback chain until one recovers.
    ///
    /// Only the first strategy consults the handler; fallbacks use their own action.
    async fn run_strategy(
        &self,
        handler: &dyn RecoveryHandler,
        ctx: &ErrorContext,
        strategy: &RecoveryStrategy,
        out: &mut Outcome,
    ) -> bool {
        let mut current = strategy;
        let mut consult_handler = true;
        loop {
            let attempts = current.attempts();
            for attempt in 0..attempts {
                let action = if consult_handler {
                    match handler.choose_action(ctx, attempt).await {
                        Ok(action) => action,
                        Err(e) => {
                            tracing::warn!(handler = handler.name(), error = %e, "recovery handler failed");
                            out.actions.push(RecoveryAction::Escalate);
                            out.attempts += 1;
                            out.last_error = Some(e.to_string());
                            return false;
                        }
                    }
                } else {
                    current.action
                };
                out.actions.push(action);
                out.attempts += 1;

                if action.is_terminal() {
                    return true;
                }

                let err = match time::timeout(current.timeout, self.executor.execute(action, ctx)).await {
                    Ok(Ok(())) => return true,
                    Ok(Err(e)) => e,
                    Err(_elapsed) => RecoveryError::Timeout(current.timeout),
                };
                tracing::debug!(action = %action, attempt, error = %err, "recovery attempt failed");
                out.last_error = Some(err.to_string());

                if attempt + 1 < attempts {
                    time::sleep(current.backoff.next(attempt)).await;
                }
            }

            match current.fallback.as_deref() {
                Some(fallback) => {
                    current = fallback;
                    consult_handler = false;
                }
                None => return false,
            }
        }
    }

    fn record(&self, report: &IncidentReport) {
        let ctx = &report.context;
        let component = ctx.component.as_deref().unwrap_or("-");
        let actions: Vec<&str> = report.actions.iter().map(RecoveryAction::as_str).collect();
        if report.success {
            tracing::info!(
                incident = %report.id,
                component,
                error_type = %ctx.error_type,
                severity = %ctx.severity,
                actions = ?actions,
                "incident recovered"
            );
        } else {
            tracing::warn!(
                incident = %report.id,
                component,
                error_type = %ctx.error_type,
                severity = %ctx.severity,
                actions = ?actions,
                "incident not recovered"
            );
        }

        self.lock_log().push(report.clone());

        if let Some(bus) = &self.bus {
            let mut ev = Event::new(EventKind::IncidentRecorded)
                .with_attempt(report.metadata.attempts)
                .with_reason(format!(
                    "{}/{}: {} -> {}",
                    ctx.error_type,
                    ctx.severity,
                    actions.join(","),
                    if report.success { "recovered" } else { "failed" }
                ));
            if let Some(c) = &ctx.component {
                ev = ev.with_component(c.as_str());
            }
            bus.publish(ev);
        }
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, IncidentLog> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::BackoffPolicy;
    use crate::recovery::context::ErrorReason;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` executions.
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RecoveryExecutor for Flaky {
        async fn execute(&self, _action: RecoveryAction, _ctx: &ErrorContext) -> Result<(), RecoveryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RecoveryError::Failed(format!("attempt {n}")))
            } else {
                Ok(())
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl RecoveryHandler for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn can_handle(&self, ctx: &ErrorContext) -> bool {
            ctx.error_type == ErrorType::Execution
        }
        async fn choose_action(&self, _: &ErrorContext, _: u32) -> Result<RecoveryAction, RecoveryError> {
            Err(RecoveryError::Handler {
                handler: "broken".into(),
                reason: "lookup table missing".into(),
            })
        }
    }

    fn system() -> ErrorRecoverySystem {
        ErrorRecoverySystem::new(&Config::default())
    }

    #[tokio::test]
    async fn test_risk_critical_safe_mode() {
        let rs = system();
        let report = rs
            .handle_error(ErrorContext::new(ErrorType::Risk, Severity::Critical, "drawdown"))
            .await;
        assert!(report.success);
        assert_eq!(report.actions, vec![RecoveryAction::SafeMode]);
        assert_eq!(report.metadata.handler.as_deref(), Some("risk"));
    }

    #[tokio::test]
    async fn test_unclaimed_error_escalates_and_fails() {
        let rs = system();
        let report = rs
            .handle_error(ErrorContext::new(ErrorType::Network, Severity::High, "dns"))
            .await;
        assert!(!report.success);
        assert_eq!(report.actions, vec![RecoveryAction::Escalate]);
        assert_eq!(report.metadata.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_executor_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let rs = system().with_executor(Flaky {
            failures: 2,
            calls: calls.clone(),
        });

        let started = Instant::now();
        let report = rs
            .handle_error(
                ErrorContext::new(ErrorType::Data, Severity::Medium, "feed stalled")
                    .with_reason(ErrorReason::Timeout),
            )
            .await;

        assert!(report.success);
        assert_eq!(report.actions, vec![RecoveryAction::Retry; 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let rs = system().with_executor(Flaky {
            failures: 2,
            calls: calls.clone(),
        });
        rs.set_strategy(
            ErrorType::Execution,
            RecoveryStrategy::new(RecoveryAction::Retry)
                .with_retries(1, BackoffPolicy::constant(Duration::from_millis(10)))
                .with_fallback(RecoveryStrategy::new(RecoveryAction::Fallback)),
        );

        let report = rs
            .handle_error(ErrorContext::new(ErrorType::Execution, Severity::High, "reject"))
            .await;
        assert!(report.success);
        assert_eq!(
            report.actions,
            vec![RecoveryAction::Retry, RecoveryAction::Retry, RecoveryAction::Fallback]
        );
        assert_eq!(report.metadata.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_timeout_counts_as_failure() {
        struct Hang;
        #[async_trait]
        impl RecoveryExecutor for Hang {
            async fn execute(&self, _: RecoveryAction, _: &ErrorContext) -> Result<(), RecoveryError> {
                time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let rs = system().with_executor(Hang);
        rs.set_strategy(
            ErrorType::Llm,
            RecoveryStrategy::new(RecoveryAction::Fallback).with_timeout(Duration::from_secs(1)),
        );
        let report = rs
            .handle_error(ErrorContext::new(ErrorType::Llm, Severity::Low, "model down"))
            .await;
        assert!(!report.success);
        assert_eq!(report.actions, vec![RecoveryAction::Fallback]);
        assert!(report.metadata.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_escalate() {
        let rs = system().with_handler(Broken);
        let report = rs
            .handle_error(ErrorContext::new(ErrorType::Execution, Severity::High, "x"))
            .await;
        assert!(!report.success);
        assert_eq!(report.actions, vec![RecoveryAction::Escalate]);
        assert_eq!(report.metadata.handler.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_incident_is_published_and_bounded() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let cfg = Config {
            max_incidents: 2,
            ..Config::default()
        };
        let rs = ErrorRecoverySystem::new(&cfg).with_bus(bus);

        for _ in 0..3 {
            rs.handle_error(
                ErrorContext::new(ErrorType::System, Severity::Low, "disk").with_component("db"),
            )
            .await;
        }
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::IncidentRecorded);
        assert_eq!(ev.component.as_deref(), Some("db"));
        assert_eq!(rs.incidents().len(), 2);
        assert_eq!(rs.recent_incidents(1).len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_follow_the_log() {
        let rs = system();
        for ty in [ErrorType::Risk, ErrorType::Network, ErrorType::Risk] {
            rs.handle_error(ErrorContext::new(ty, Severity::Critical, "x")).await;
        }

        let stats = rs.incident_statistics();
        assert_eq!(stats.total_incidents, 3);
        assert_eq!(stats.successful_recoveries, 2);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.by_error_type.values().sum::<usize>(), stats.total_incidents);
        assert_eq!(stats.by_error_type[&ErrorType::Risk], 2);
        assert_eq!(stats.by_action[&RecoveryAction::SafeMode], 2);
        assert_eq!(stats.by_action[&RecoveryAction::Escalate], 1);
    }

    #[tokio::test]
    async fn test_report_errors_passes_through() {
        let rs = system();
        let ok: Result<u32, String> = rs
            .report_errors("feed", ErrorType::Data, Severity::Low, async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));
        assert!(rs.incidents().is_empty());

        let err: Result<u32, String> = rs
            .report_errors("feed", ErrorType::Risk, Severity::Critical, async {
                Err("limit breached".to_string())
            })
            .await;
        assert_eq!(err, Err("limit breached".to_string()));

        let incidents = rs.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].context.component.as_deref(), Some("feed"));
        assert_eq!(incidents[0].context.message, "limit breached");
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let rs = system();
        let report = rs
            .handle_error(
                ErrorContext::new(ErrorType::Risk, Severity::Critical, "drawdown")
                    .with_component("engine")
                    .with_metadata("desk", "fx"),
            )
            .await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["context"]["error_type"], "risk");
        assert_eq!(json["context"]["severity"], "critical");
        assert_eq!(json["context"]["metadata"]["desk"], "fx");
        assert_eq!(json["actions"][0], "safe_mode");
        assert_eq!(json["success"], true);
        assert_eq!(json["id"], report.id.to_string());
    }

    #[test]
    fn test_breaker_registry_shares_instances() {
        let rs = system();
        let a = rs.circuit_breaker(
            "broker",
            Some(CircuitBreakerConfig::new("ignored").with_failure_threshold(1)),
        );
        let b = rs.circuit_breaker("broker", None);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().failure_threshold, 1);

        rs.circuit_breaker("feed", None).record_failure();
        let names: Vec<_> = rs.circuit_breakers().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["broker", "feed"]);
    }
}
