//! Error classification and recovery.
//!
//! ## Contents
//! - [`ErrorContext`], [`ErrorType`], [`Severity`], [`ErrorReason`] classified errors
//! - [`RecoveryAction`], [`RecoveryStrategy`] what to do and how persistently
//! - [`RecoveryHandler`] per-error-type action choice (five built-ins)
//! - [`RecoveryExecutor`], [`NoopExecutor`] where actions take effect
//! - [`IncidentReport`], [`IncidentStatistics`] the record of what happened
//! - [`ErrorRecoverySystem`] the pipeline tying them together

mod context;
mod executor;
mod handler;
mod incident;
mod strategy;
mod system;

pub use context::{ErrorCause, ErrorContext, ErrorReason, ErrorType, Severity};
pub use executor::{NoopExecutor, RecoveryExecutor};
pub use handler::{
    DataHandler, ExecutionHandler, LlmHandler, RecoveryHandler, RecoveryHandlerRef, RiskHandler,
    SystemHandler,
};
pub use incident::{IncidentMetadata, IncidentReport, IncidentStatistics};
pub use strategy::{RecoveryAction, RecoveryStrategy, default_strategies};
pub use system::ErrorRecoverySystem;
