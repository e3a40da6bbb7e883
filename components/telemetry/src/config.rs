//! Telemetry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the metric registry and the background collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// When false, recording is a no-op and the collector never starts
    pub enabled: bool,
    /// Samples retained per metric
    pub buffer_capacity: usize,
    /// Start the background collector with the runtime
    pub collector_enabled: bool,
    /// Collector sampling interval
    pub collector_interval_ms: u64,
    /// How long shutdown waits for the collector thread
    pub shutdown_timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_capacity: 1000,
            collector_enabled: false,
            collector_interval_ms: 1000,
            shutdown_timeout_ms: 500,
        }
    }
}

impl TelemetryConfig {
    /// Sampling interval as a duration
    pub fn collector_interval(&self) -> Duration {
        Duration::from_millis(self.collector_interval_ms)
    }

    /// Shutdown wait as a duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
