//! # Side-effect point of the recovery pipeline.
//!
//! Handlers *choose* actions; a [`RecoveryExecutor`] *performs* the
//! non-terminal ones (Retry, Fallback, Reset, Restart). Terminal actions never
//! reach the executor.
//!
//! The default [`NoopExecutor`] reports success without doing anything, which
//! leaves the real side effect to the caller that observes the incident report.

use async_trait::async_trait;

use crate::error::RecoveryError;
use crate::recovery::context::ErrorContext;
use crate::recovery::strategy::RecoveryAction;

/// Performs a recovery action.
#[async_trait]
pub trait RecoveryExecutor: Send + Sync + 'static {
    /// Executes `action` for `ctx`. `Ok(())` means the system recovered.
    ///
    /// Bounded by the strategy timeout; a timeout counts as a failed attempt.
    async fn execute(&self, action: RecoveryAction, ctx: &ErrorContext) -> Result<(), RecoveryError>;
}

/// Executor that always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

#[async_trait]
impl RecoveryExecutor for NoopExecutor {
    async fn execute(&self, action: RecoveryAction, ctx: &ErrorContext) -> Result<(), RecoveryError> {
        tracing::debug!(
            action = %action,
            error_type = %ctx.error_type,
            component = ctx.component.as_deref().unwrap_or("-"),
            "recovery action (noop)"
        );
        Ok(())
    }
}
