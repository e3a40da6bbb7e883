//! Serializable performance report

use crate::alerts::AlertSummary;
use crate::stats::MetricSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time view of every metric, the derived rates and open alerts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// Registry uptime in seconds
    pub uptime_secs: f64,
    /// Interpreted instructions per second of uptime
    pub instructions_per_second: f64,
    /// Faults per interpreted instruction
    pub error_rate: f64,
    /// Per-metric summaries
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Alert counts and open alerts
    pub alerts: AlertSummary,
}
