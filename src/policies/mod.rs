//! Restart and retry policies.
//!
//! This module groups the knobs that decide **whether** a component is restarted
//! and **how long** a recovery strategy waits between attempts.
//!
//! ## Contents
//! - [`RestartPolicy`] when the watchdog restarts a component (never / on-failure / always / unless-stopped)
//! - [`BackoffPolicy`] how recovery retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the backoff delay
//!
//! ## Quick wiring
//! ```text
//! ComponentSpec { restart: RestartPolicy, max_restarts, restart_delay, .. }
//!      └─► core::supervisor::Watchdog::tick() asks the policy on exit / unhealthy
//!
//! RecoveryStrategy { backoff: BackoffPolicy, max_retries, .. }
//!      └─► recovery::ErrorRecoverySystem sleeps backoff.next(attempt) between attempts
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
