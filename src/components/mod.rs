//! # Component abstractions and specifications.
//!
//! - [`ComponentSpec`] - immutable description of a supervised process
//! - [`HealthCheck`] - async probe that reports whether a component is fit
//! - [`HealthCheckFn`] - closure-backed probe
//! - [`HealthCheckSpec`] - probe plus cadence, timeout and streak thresholds
//! - [`ComponentStatus`], [`ComponentState`] - watchdog state machine snapshot

mod check;
mod spec;
mod state;

pub use check::{CheckError, HealthCheck, HealthCheckFn, HealthCheckRef};
pub use spec::{ComponentSpec, ComponentSpecBuilder, HealthCheckSpec};
pub use state::{ComponentState, ComponentStatus};
