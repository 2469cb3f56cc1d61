//! # Recovery actions and per-error-type strategies.
//!
//! A [`RecoveryStrategy`] bounds how hard the recovery system tries:
//! `max_retries + 1` attempts, [`BackoffPolicy`] delays between them, a
//! per-attempt timeout, and an optional fallback strategy once retries run out.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::policies::BackoffPolicy;
use crate::recovery::context::ErrorType;

/// What the recovery system does about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    Fallback,
    Reset,
    Escalate,
    Ignore,
    SafeMode,
    Restart,
}

impl RecoveryAction {
    /// Terminal actions settle the incident without being executed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryAction::Ignore | RecoveryAction::Escalate | RecoveryAction::SafeMode
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Retry => "retry",
            RecoveryAction::Fallback => "fallback",
            RecoveryAction::Reset => "reset",
            RecoveryAction::Escalate => "escalate",
            RecoveryAction::Ignore => "ignore",
            RecoveryAction::SafeMode => "safe_mode",
            RecoveryAction::Restart => "restart",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry budget and pacing for one class of errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryStrategy {
    /// Nominal action; used as-is when this strategy runs as a fallback.
    pub action: RecoveryAction,
    pub max_retries: u32,
    /// `first` is the initial retry delay, `factor` the multiplier.
    pub backoff: BackoffPolicy,
    /// Upper bound of a single executed action.
    pub timeout: Duration,
    pub fallback: Option<Box<RecoveryStrategy>>,
}

impl RecoveryStrategy {
    /// Single-attempt strategy with a 30s action timeout.
    pub fn new(action: RecoveryAction) -> Self {
        Self {
            action,
            max_retries: 0,
            backoff: BackoffPolicy::immediate(),
            timeout: Duration::from_secs(30),
            fallback: None,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: BackoffPolicy) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: RecoveryStrategy) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Total attempts this strategy makes before giving up.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Built-in strategy table.
///
/// | type      | action   | retries | delay | factor |
/// |-----------|----------|---------|-------|--------|
/// | Data      | Retry    | 3       | 1s    | 2.0    |
/// | Risk      | SafeMode | 0       |       |        |
/// | Execution | Retry    | 5       | 0.5s  | 1.5    |
/// | Llm       | Fallback | 2       | 2s    | 1.0    |
/// | System    | Escalate | 0       |       |        |
///
/// `Network` has no entry; its handler's action is executed once.
pub fn default_strategies() -> HashMap<ErrorType, RecoveryStrategy> {
    HashMap::from([
        (
            ErrorType::Data,
            RecoveryStrategy::new(RecoveryAction::Retry)
                .with_retries(3, BackoffPolicy::exponential(Duration::from_secs(1), 2.0)),
        ),
        (ErrorType::Risk, RecoveryStrategy::new(RecoveryAction::SafeMode)),
        (
            ErrorType::Execution,
            RecoveryStrategy::new(RecoveryAction::Retry)
                .with_retries(5, BackoffPolicy::exponential(Duration::from_millis(500), 1.5)),
        ),
        (
            ErrorType::Llm,
            RecoveryStrategy::new(RecoveryAction::Fallback)
                .with_retries(2, BackoffPolicy::constant(Duration::from_secs(2))),
        ),
        (ErrorType::System, RecoveryStrategy::new(RecoveryAction::Escalate)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_actions() {
        let terminal: Vec<_> = [
            RecoveryAction::Retry,
            RecoveryAction::Fallback,
            RecoveryAction::Reset,
            RecoveryAction::Escalate,
            RecoveryAction::Ignore,
            RecoveryAction::SafeMode,
            RecoveryAction::Restart,
        ]
        .into_iter()
        .filter(RecoveryAction::is_terminal)
        .collect();
        assert_eq!(
            terminal,
            vec![
                RecoveryAction::Escalate,
                RecoveryAction::Ignore,
                RecoveryAction::SafeMode
            ]
        );
    }

    #[test]
    fn test_default_table() {
        let table = default_strategies();
        assert_eq!(table.len(), 5);
        assert!(!table.contains_key(&ErrorType::Network));

        let data = &table[&ErrorType::Data];
        assert_eq!(data.attempts(), 4);
        assert_eq!(data.backoff.next(0), Duration::from_secs(1));
        assert_eq!(data.backoff.next(2), Duration::from_secs(4));

        let exec = &table[&ErrorType::Execution];
        assert_eq!(exec.backoff.next(1), Duration::from_millis(750));

        assert_eq!(table[&ErrorType::Risk].action, RecoveryAction::SafeMode);
        assert_eq!(table[&ErrorType::Llm].backoff.next(1), Duration::from_secs(2));
    }
}
