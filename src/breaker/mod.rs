//! Circuit breakers guarding calls to flaky dependencies.
//!
//! ## Contents
//! - [`CircuitBreaker`] mutex-guarded Closed / Open / HalfOpen state machine
//! - [`CircuitBreakerConfig`] thresholds and timeouts of one breaker
//! - [`CircuitState`], [`CircuitSnapshot`] public read views
//!
//! Breakers are usually obtained from
//! [`ErrorRecoverySystem::circuit_breaker`](crate::ErrorRecoverySystem::circuit_breaker),
//! which keeps one shared instance per name.

mod circuit;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
