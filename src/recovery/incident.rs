//! # Incident reports and the bounded incident log.
//!
//! Every handled error produces exactly one [`IncidentReport`]. Reports are
//! never mutated after they are appended. Statistics are derived by a linear
//! scan over the retained reports; evicted reports no longer count.

use std::collections::{BTreeMap, VecDeque};
use std::time::SystemTime;

use serde::Serialize;
use uuid::Uuid;

use crate::recovery::context::{ErrorContext, ErrorType};
use crate::recovery::strategy::RecoveryAction;

/// Bookkeeping attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentMetadata {
    /// Handler that chose the actions, if one claimed the error.
    pub handler: Option<String>,
    /// Number of attempts made across the strategy and its fallbacks.
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Last handler or executor failure, if any.
    pub last_error: Option<String>,
}

/// One handled error and what was done about it.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentReport {
    pub id: Uuid,
    pub context: ErrorContext,
    /// Actions in the order they were taken.
    pub actions: Vec<RecoveryAction>,
    pub resolved_at: SystemTime,
    pub success: bool,
    pub metadata: IncidentMetadata,
}

/// Aggregates over the incident log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentStatistics {
    pub total_incidents: usize,
    pub successful_recoveries: usize,
    /// `successful_recoveries / total_incidents`, `0.0` for an empty log.
    pub success_rate: f64,
    /// Sums to `total_incidents`.
    pub by_error_type: BTreeMap<ErrorType, usize>,
    /// Sums to at least `total_incidents` when every report took an action.
    pub by_action: BTreeMap<RecoveryAction, usize>,
}

/// Append-only log, oldest evicted first when bounded.
#[derive(Debug)]
pub(crate) struct IncidentLog {
    reports: VecDeque<IncidentReport>,
    capacity: Option<usize>,
}

impl IncidentLog {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            reports: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, report: IncidentReport) {
        if let Some(cap) = self.capacity {
            while self.reports.len() >= cap {
                self.reports.pop_front();
            }
        }
        self.reports.push_back(report);
    }

    pub(crate) fn all(&self) -> Vec<IncidentReport> {
        self.reports.iter().cloned().collect()
    }

    /// The `n` newest reports, oldest first.
    pub(crate) fn recent(&self, n: usize) -> Vec<IncidentReport> {
        let skip = self.reports.len().saturating_sub(n);
        self.reports.iter().skip(skip).cloned().collect()
    }

    pub(crate) fn statistics(&self) -> IncidentStatistics {
        let mut stats = IncidentStatistics {
            total_incidents: self.reports.len(),
            ..IncidentStatistics::default()
        };
        for report in &self.reports {
            if report.success {
                stats.successful_recoveries += 1;
            }
            *stats.by_error_type.entry(report.context.error_type).or_default() += 1;
            for action in &report.actions {
                *stats.by_action.entry(*action).or_default() += 1;
            }
        }
        if stats.total_incidents > 0 {
            stats.success_rate = stats.successful_recoveries as f64 / stats.total_incidents as f64;
        }
        stats
    }
}
