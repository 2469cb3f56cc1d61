//! # Error classification: what went wrong, how badly, and where.
//!
//! An [`ErrorContext`] is built at the failure site and consumed once by
//! [`ErrorRecoverySystem::handle_error`](crate::ErrorRecoverySystem::handle_error).
//!
//! ```text
//! ErrorType  selects the handler and the strategy
//! Severity   tunes the handler's choice (Risk, System)
//! ErrorReason refines it further (Data, Execution, Llm)
//! ```

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

/// Subsystem the error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Data,
    Risk,
    Execution,
    Llm,
    System,
    Network,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Data => "data",
            ErrorType::Risk => "risk",
            ErrorType::Execution => "execution",
            ErrorType::Llm => "llm",
            ErrorType::System => "system",
            ErrorType::Network => "network",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad the error is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured sub-reason set by the origin of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    Timeout,
    InvalidPayload,
    ConnectionLost,
    RateLimited,
    #[default]
    Unspecified,
}

impl ErrorReason {
    /// Best-effort classification of a free-text message.
    ///
    /// Only used when the origin did not set a reason.
    ///
    /// ```
    /// use faultguard::ErrorReason;
    ///
    /// assert_eq!(ErrorReason::infer("Request TIMEOUT after 5s"), ErrorReason::Timeout);
    /// assert_eq!(ErrorReason::infer("hit rate limit"), ErrorReason::RateLimited);
    /// assert_eq!(ErrorReason::infer("disk full"), ErrorReason::Unspecified);
    /// ```
    pub fn infer(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("timeout") {
            ErrorReason::Timeout
        } else if msg.contains("invalid") {
            ErrorReason::InvalidPayload
        } else if msg.contains("connection") {
            ErrorReason::ConnectionLost
        } else if msg.contains("rate limit") {
            ErrorReason::RateLimited
        } else {
            ErrorReason::Unspecified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::Timeout => "timeout",
            ErrorReason::InvalidPayload => "invalid_payload",
            ErrorReason::ConnectionLost => "connection_lost",
            ErrorReason::RateLimited => "rate_limited",
            ErrorReason::Unspecified => "unspecified",
        }
    }
}

/// Shared, type-erased underlying error.
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// A classified error occurrence.
#[derive(Clone, Serialize)]
pub struct ErrorContext {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub reason: ErrorReason,
    pub message: String,
    /// Component the error originated in, if known.
    pub component: Option<String>,
    pub timestamp: SystemTime,
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    pub cause: Option<ErrorCause>,
}

impl ErrorContext {
    pub fn new(error_type: ErrorType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            error_type,
            severity,
            reason: ErrorReason::Unspecified,
            message: message.into(),
            component: None,
            timestamp: SystemTime::now(),
            metadata: BTreeMap::new(),
            cause: None,
        }
    }

    pub fn with_reason(mut self, reason: ErrorReason) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attaches the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attaches an already shared underlying error.
    pub fn with_shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// The reason handlers act on: the explicit one, or one inferred from the message.
    pub fn effective_reason(&self) -> ErrorReason {
        match self.reason {
            ErrorReason::Unspecified => ErrorReason::infer(&self.message),
            r => r,
        }
    }
}

impl fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorContext")
            .field("error_type", &self.error_type)
            .field("severity", &self.severity)
            .field("reason", &self.reason)
            .field("message", &self.message)
            .field("component", &self.component)
            .field("metadata", &self.metadata)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_reason_wins_over_message() {
        let ctx = ErrorContext::new(ErrorType::Data, Severity::Low, "invalid json")
            .with_reason(ErrorReason::ConnectionLost);
        assert_eq!(ctx.effective_reason(), ErrorReason::ConnectionLost);

        let ctx = ErrorContext::new(ErrorType::Data, Severity::Low, "invalid json");
        assert_eq!(ctx.effective_reason(), ErrorReason::InvalidPayload);
    }

    #[test]
    fn test_severity_is_ordered() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
    }

    #[test]
    fn test_cause_is_kept_but_not_serialized() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let ctx = ErrorContext::new(ErrorType::Network, Severity::High, "feed dropped")
            .with_component("feed")
            .with_cause(io);
        assert_eq!(ctx.cause.as_ref().unwrap().to_string(), "pipe closed");

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["error_type"], "network");
        assert_eq!(json["component"], "feed");
        assert!(json.get("cause").is_none());
    }
}
