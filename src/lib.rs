//! # faultguard
//!
//! **faultguard** is the in-process fault-tolerance core of a trading platform.
//!
//! It keeps long-running component processes alive, isolates failing
//! dependencies behind circuit breakers, and turns raw errors into typed,
//! recorded incidents with pluggable recovery strategies.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!     │ ComponentSpec │   │ ComponentSpec │   │ ComponentSpec │
//!     │   (db, deps)  │   │ (api → db)    │   │ (engine → api)│
//!     └──────┬────────┘   └──────┬────────┘   └──────┬────────┘
//!            ▼                   ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime (explicit context object)                                │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - Watchdog                                                       │
//! │      ├─ Registry (specs, state, restart locks, DependencyGraph)   │
//! │      ├─ ProcessSupervisor (one child process per component)       │
//! │      └─ HealthMonitor (one probe task per component/check)        │
//! │  - ErrorRecoverySystem                                            │
//! │      ├─ RecoveryHandlers + RecoveryStrategies + RecoveryExecutor  │
//! │      ├─ incident log                                              │
//! │      └─ named CircuitBreakers                                     │
//! └──────┬───────────────────────────┬──────────────────────────┬─────┘
//!        │ StatusChanged, Restart*,  │ CircuitOpened/HalfOpened │ IncidentRecorded
//!        │ HealthCheck*, Component*  │ /Closed/Rejected         │
//!        ▼                           ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                     (capacity: Config::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌────────┼────────┐
//!                          ▼        ▼        ▼
//!                       LogWriter  custom   custom
//! ```
//!
//! ### Component lifecycle
//! ```text
//! Stopped ──start()──► Healthy ◄──────────── checks pass ──────────┐
//!                        │ checks fail (tick)                      │
//!                        ▼                                         │
//!                     Degraded ── checks fail (tick) ──► Unhealthy ┘
//!                                                           │ restart policy
//!                                                           ▼
//!                     restart(): budget left? ──no──► Unhealthy (terminal)
//!                                  │ yes
//!                                  ▼
//!                  Restarting ─► stop ─► sleep(restart_delay) ─► start ─► Healthy
//!
//! process exited (tick) ─► restarts_on_exit(code, manually_stopped) ? restart() : Stopped
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                                  |
//! |-------------------|----------------------------------------------------------|-----------------------------------------------------|
//! | **Supervision**   | Start/stop/restart processes in dependency order.        | [`Watchdog`], [`ComponentSpec`], [`RestartPolicy`]  |
//! | **Health**        | Periodic, cancellable, timeout-bounded probes.           | [`HealthCheck`], [`HealthCheckFn`], [`HealthCheckSpec`] |
//! | **Breakers**      | Fail fast while a dependency is down.                    | [`CircuitBreaker`], [`CircuitBreakerConfig`]        |
//! | **Recovery**      | Classify errors, run strategies, record incidents.       | [`ErrorRecoverySystem`], [`RecoveryHandler`], [`RecoveryExecutor`] |
//! | **Subscriber API**| Hook into every lifecycle event (logging, metrics).      | [`Subscribe`], [`LogWriter`]                        |
//! | **Errors**        | Typed errors per subsystem.                              | [`SupervisorError`], [`CircuitError`], [`RecoveryError`] |
//! | **Configuration** | Centralized runtime settings and component defaults.     | [`Config`]                                          |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use faultguard::{
//!     CircuitBreakerConfig, ComponentSpec, Config, ErrorContext, ErrorType, RecoveryAction,
//!     RestartPolicy, Runtime, Severity,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let rt = Runtime::builder(cfg.clone()).build();
//!
//!     // A component that is never started here, only registered.
//!     rt.watchdog()
//!         .register(
//!             ComponentSpec::with_defaults("feed", "./feed-handler", &cfg)
//!                 .restart(RestartPolicy::Always)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     // Guard a flaky dependency.
//!     let broker = rt.recovery().circuit_breaker(
//!         "broker",
//!         Some(CircuitBreakerConfig::new("broker").with_call_timeout(Duration::from_secs(2))),
//!     );
//!     let quote = broker.execute(|| async { Ok::<_, std::io::Error>(101.5) }).await?;
//!     assert_eq!(quote, 101.5);
//!
//!     // Report an error and inspect what was done about it.
//!     let report = rt
//!         .recovery()
//!         .handle_error(ErrorContext::new(ErrorType::Risk, Severity::Critical, "drawdown limit"))
//!         .await;
//!     assert!(report.success);
//!     assert_eq!(report.actions, vec![RecoveryAction::SafeMode]);
//!
//!     rt.shutdown().await;
//!     Ok(())
//! }
//! ```
mod breaker;
mod components;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod recovery;
mod subscribers;

// ---- Public re-exports ----

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use components::{
    CheckError, ComponentSpec, ComponentSpecBuilder, ComponentState, ComponentStatus, HealthCheck,
    HealthCheckFn, HealthCheckRef, HealthCheckSpec,
};
pub use config::Config;
pub use core::{
    CheckCounters, DependencyGraph, HealthMonitor, ProcessInfo, ProcessStatus, ProcessSupervisor,
    RestartOutcome, Runtime, RuntimeBuilder, SystemHealth, Watchdog, wait_for_shutdown_signal,
};
pub use error::{
    CircuitError, ConfigError, GraphError, ProcessError, RecoveryError, SupervisorError,
};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use recovery::{
    DataHandler, ErrorCause, ErrorContext, ErrorReason, ErrorRecoverySystem, ErrorType,
    ExecutionHandler, IncidentMetadata, IncidentReport, IncidentStatistics, LlmHandler,
    NoopExecutor, RecoveryAction, RecoveryExecutor, RecoveryHandler, RecoveryHandlerRef,
    RecoveryStrategy, RiskHandler, Severity, SystemHandler, default_strategies,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
