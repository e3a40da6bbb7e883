//! Fault and recovery accounting snapshots

use crate::record::FaultRecord;
use core_types::{FaultCategory, FaultCode, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Number of records included in [`ErrorMetrics::recent`]
pub const RECENT_RECORDS: usize = 10;

/// Recovery counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryStats {
    /// Recoveries started
    pub attempted: u64,
    /// Recoveries that succeeded
    pub succeeded: u64,
    /// Recoveries that failed
    pub failed: u64,
    /// Time spent in recovery
    pub total_time: Duration,
    /// Runs per strategy name
    pub by_strategy: BTreeMap<String, u64>,
}

impl RecoveryStats {
    /// Mean recovery time in milliseconds; zero before the first recovery
    pub fn average_recovery_ms(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.total_time.as_secs_f64() * 1000.0 / self.attempted as f64
    }

    /// Fraction of recoveries that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.attempted as f64
    }
}

/// Snapshot returned by `get_error_metrics`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorMetrics {
    /// Faults handled since the last clear
    pub total: u64,
    /// Count per code
    pub by_code: BTreeMap<FaultCode, u64>,
    /// Count per severity
    pub by_severity: BTreeMap<Severity, u64>,
    /// Count per category
    pub by_category: BTreeMap<FaultCategory, u64>,
    /// Records currently retained
    pub history_len: usize,
    /// Up to ten most recent records, oldest first
    pub recent: Vec<FaultRecord>,
    /// Recovery counters
    pub recovery: RecoveryStats,
}

impl ErrorMetrics {
    /// Count for one code, zero if never seen
    pub fn count(&self, code: FaultCode) -> u64 {
        self.by_code.get(&code).copied().unwrap_or(0)
    }
}
