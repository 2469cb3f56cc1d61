//! Runtime core: supervision, health and lifecycle.
//!
//! Public API from this module: [`Watchdog`], [`Runtime`], [`RuntimeBuilder`]
//! and the process / graph / health building blocks they are made of.
//!
//! Modules:
//! - [`graph`]: dependency ordering of components;
//! - [`process`]: spawning, polling and stopping child processes;
//! - [`health`]: independent, cancellable health-probe loops;
//! - [`registry`]: component specs, live state and restart locks;
//! - [`supervisor`]: the watchdog state machine and monitoring loop;
//! - [`runtime`] / [`builder`]: the context object wiring everything together;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
pub mod graph;
pub mod health;
pub mod process;
mod registry;
mod runtime;
mod shutdown;
mod supervisor;

pub use builder::RuntimeBuilder;
pub use graph::DependencyGraph;
pub use health::{CheckCounters, HealthMonitor};
pub use process::{ProcessInfo, ProcessStatus, ProcessSupervisor};
pub use runtime::Runtime;
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{RestartOutcome, SystemHealth, Watchdog};
