//! Fault subsystem configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the fault handler and its built-in strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Records kept in history before the oldest is evicted
    pub history_capacity: usize,
    /// Upper bound on recovery attempts per fault
    pub max_attempts: u32,
    /// First retry backoff, doubled per attempt
    pub base_backoff_ms: u64,
    /// Backoff ceiling before jitter
    pub max_backoff_ms: u64,
    /// Wall-clock budget for one recovery
    pub recovery_deadline_ms: u64,
    /// Consecutive failures that trip a circuit open
    pub circuit_failure_threshold: u32,
    /// Time an open circuit waits before half-opening
    pub circuit_reset_timeout_ms: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            max_attempts: 3,
            base_backoff_ms: 10,
            max_backoff_ms: 1000,
            recovery_deadline_ms: 5000,
            circuit_failure_threshold: 5,
            circuit_reset_timeout_ms: 30_000,
        }
    }
}

impl FaultConfig {
    /// Base backoff as a duration
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Backoff ceiling as a duration
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Recovery budget as a duration
    pub fn recovery_deadline(&self) -> Duration {
        Duration::from_millis(self.recovery_deadline_ms)
    }

    /// Open-circuit wait as a duration
    pub fn circuit_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_reset_timeout_ms)
    }
}
