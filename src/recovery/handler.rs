//! # Recovery handlers: pick an action for a classified error.
//!
//! The recovery system asks the first handler whose [`can_handle`](RecoveryHandler::can_handle)
//! returns true. A handler is consulted once per attempt, so it may escalate
//! as `attempt` grows.
//!
//! Built-in handlers, in lookup order:
//!
//! | handler          | error type | decides on        |
//! |------------------|------------|-------------------|
//! | DataHandler      | Data       | reason            |
//! | RiskHandler      | Risk       | severity          |
//! | ExecutionHandler | Execution  | reason            |
//! | LlmHandler       | Llm        | reason            |
//! | SystemHandler    | System     | severity          |
//!
//! `Network` errors have no built-in handler and are escalated.

use async_trait::async_trait;

use crate::error::RecoveryError;
use crate::recovery::context::{ErrorContext, ErrorReason, ErrorType, Severity};
use crate::recovery::strategy::RecoveryAction;

/// Shared handle to a handler.
pub type RecoveryHandlerRef = std::sync::Arc<dyn RecoveryHandler>;

/// # Chooses a recovery action for errors it claims.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use faultguard::{ErrorContext, ErrorType, RecoveryAction, RecoveryError, RecoveryHandler};
///
/// struct FeedHandler;
///
/// #[async_trait]
/// impl RecoveryHandler for FeedHandler {
///     fn name(&self) -> &str { "feed" }
///
///     fn can_handle(&self, ctx: &ErrorContext) -> bool {
///         ctx.error_type == ErrorType::Network && ctx.component.as_deref() == Some("feed")
///     }
///
///     async fn choose_action(&self, _ctx: &ErrorContext, attempt: u32) -> Result<RecoveryAction, RecoveryError> {
///         Ok(if attempt == 0 { RecoveryAction::Reset } else { RecoveryAction::Escalate })
///     }
/// }
/// ```
#[async_trait]
pub trait RecoveryHandler: Send + Sync + 'static {
    /// Name recorded in incident metadata.
    fn name(&self) -> &str;

    fn can_handle(&self, ctx: &ErrorContext) -> bool;

    /// Action for attempt `attempt` (0-indexed) of the current strategy.
    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError>;
}

/// Market-data feed errors.
pub struct DataHandler;

#[async_trait]
impl RecoveryHandler for DataHandler {
    fn name(&self) -> &str {
        "data"
    }

    fn can_handle(&self, ctx: &ErrorContext) -> bool {
        ctx.error_type == ErrorType::Data
    }

    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        _attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError> {
        Ok(match ctx.effective_reason() {
            ErrorReason::InvalidPayload => RecoveryAction::Fallback,
            ErrorReason::ConnectionLost => RecoveryAction::Reset,
            ErrorReason::Timeout | ErrorReason::RateLimited | ErrorReason::Unspecified => {
                RecoveryAction::Retry
            }
        })
    }
}

/// Risk-limit breaches. Never retried.
pub struct RiskHandler;

#[async_trait]
impl RecoveryHandler for RiskHandler {
    fn name(&self) -> &str {
        "risk"
    }

    fn can_handle(&self, ctx: &ErrorContext) -> bool {
        ctx.error_type == ErrorType::Risk
    }

    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        _attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError> {
        Ok(match ctx.severity {
            Severity::Critical | Severity::High => RecoveryAction::SafeMode,
            Severity::Medium => RecoveryAction::Escalate,
            Severity::Low => RecoveryAction::Ignore,
        })
    }
}

/// Order placement and broker errors.
pub struct ExecutionHandler;

#[async_trait]
impl RecoveryHandler for ExecutionHandler {
    fn name(&self) -> &str {
        "execution"
    }

    fn can_handle(&self, ctx: &ErrorContext) -> bool {
        ctx.error_type == ErrorType::Execution
    }

    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        _attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError> {
        Ok(match ctx.effective_reason() {
            ErrorReason::ConnectionLost => RecoveryAction::Reset,
            ErrorReason::InvalidPayload => RecoveryAction::Escalate,
            ErrorReason::Timeout | ErrorReason::RateLimited | ErrorReason::Unspecified => {
                RecoveryAction::Retry
            }
        })
    }
}

/// Model provider errors. Prefers switching providers over hammering one.
pub struct LlmHandler;

#[async_trait]
impl RecoveryHandler for LlmHandler {
    fn name(&self) -> &str {
        "llm"
    }

    fn can_handle(&self, ctx: &ErrorContext) -> bool {
        ctx.error_type == ErrorType::Llm
    }

    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        _attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError> {
        Ok(match ctx.effective_reason() {
            ErrorReason::Timeout => RecoveryAction::Retry,
            ErrorReason::RateLimited
            | ErrorReason::InvalidPayload
            | ErrorReason::ConnectionLost
            | ErrorReason::Unspecified => RecoveryAction::Fallback,
        })
    }
}

/// Host and process-level errors.
pub struct SystemHandler;

#[async_trait]
impl RecoveryHandler for SystemHandler {
    fn name(&self) -> &str {
        "system"
    }

    fn can_handle(&self, ctx: &ErrorContext) -> bool {
        ctx.error_type == ErrorType::System
    }

    async fn choose_action(
        &self,
        ctx: &ErrorContext,
        _attempt: u32,
    ) -> Result<RecoveryAction, RecoveryError> {
        Ok(match ctx.severity {
            Severity::Critical => RecoveryAction::Restart,
            _ => RecoveryAction::Escalate,
        })
    }
}

/// The built-in handlers in lookup order.
pub fn builtin_handlers() -> Vec<RecoveryHandlerRef> {
    vec![
        std::sync::Arc::new(DataHandler),
        std::sync::Arc::new(RiskHandler),
        std::sync::Arc::new(ExecutionHandler),
        std::sync::Arc::new(LlmHandler),
        std::sync::Arc::new(SystemHandler),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pick(ty: ErrorType, severity: Severity, msg: &str) -> RecoveryAction {
        let ctx = ErrorContext::new(ty, severity, msg);
        let handlers = builtin_handlers();
        let h = handlers.iter().find(|h| h.can_handle(&ctx)).unwrap();
        h.choose_action(&ctx, 0).await.unwrap()
    }

    #[tokio::test]
    async fn test_data_rules() {
        assert_eq!(pick(ErrorType::Data, Severity::Low, "read timeout").await, RecoveryAction::Retry);
        assert_eq!(pick(ErrorType::Data, Severity::Low, "invalid tick").await, RecoveryAction::Fallback);
        assert_eq!(pick(ErrorType::Data, Severity::Low, "connection reset").await, RecoveryAction::Reset);
        assert_eq!(pick(ErrorType::Data, Severity::Low, "gap").await, RecoveryAction::Retry);
    }

    #[tokio::test]
    async fn test_risk_rules() {
        assert_eq!(pick(ErrorType::Risk, Severity::Critical, "x").await, RecoveryAction::SafeMode);
        assert_eq!(pick(ErrorType::Risk, Severity::High, "x").await, RecoveryAction::SafeMode);
        assert_eq!(pick(ErrorType::Risk, Severity::Medium, "x").await, RecoveryAction::Escalate);
        assert_eq!(pick(ErrorType::Risk, Severity::Low, "x").await, RecoveryAction::Ignore);
    }

    #[tokio::test]
    async fn test_execution_and_llm_rules() {
        assert_eq!(pick(ErrorType::Execution, Severity::High, "invalid order").await, RecoveryAction::Escalate);
        assert_eq!(pick(ErrorType::Execution, Severity::High, "rate limit hit").await, RecoveryAction::Retry);
        assert_eq!(pick(ErrorType::Llm, Severity::Low, "rate limit hit").await, RecoveryAction::Fallback);
        assert_eq!(pick(ErrorType::Llm, Severity::Low, "timeout").await, RecoveryAction::Retry);
        assert_eq!(pick(ErrorType::Llm, Severity::Low, "model down").await, RecoveryAction::Fallback);
    }

    #[tokio::test]
    async fn test_system_rules_and_network_unclaimed() {
        assert_eq!(pick(ErrorType::System, Severity::Critical, "oom").await, RecoveryAction::Restart);
        assert_eq!(pick(ErrorType::System, Severity::High, "oom").await, RecoveryAction::Escalate);

        let ctx = ErrorContext::new(ErrorType::Network, Severity::High, "dns");
        assert!(builtin_handlers().iter().all(|h| !h.can_handle(&ctx)));
    }
}
