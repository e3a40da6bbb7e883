//! Threshold alerts over latest metric values

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Alert level, chosen by how far the value exceeds its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// At most 1.2x the threshold
    Info,
    /// Above 1.2x
    Warning,
    /// Above 1.5x
    Error,
    /// Above 2x
    Critical,
}

impl AlertLevel {
    /// Level for `value` measured against `threshold`
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry::AlertLevel;
    ///
    /// assert_eq!(AlertLevel::for_ratio(250.0, 100.0), AlertLevel::Critical);
    /// assert_eq!(AlertLevel::for_ratio(160.0, 100.0), AlertLevel::Error);
    /// assert_eq!(AlertLevel::for_ratio(130.0, 100.0), AlertLevel::Warning);
    /// assert_eq!(AlertLevel::for_ratio(110.0, 100.0), AlertLevel::Info);
    /// ```
    pub fn for_ratio(value: f64, threshold: f64) -> Self {
        let ratio = if threshold > 0.0 {
            value / threshold
        } else {
            f64::INFINITY
        };
        if ratio > 2.0 {
            AlertLevel::Critical
        } else if ratio > 1.5 {
            AlertLevel::Error
        } else if ratio > 1.2 {
            AlertLevel::Warning
        } else {
            AlertLevel::Info
        }
    }
}

/// A raised alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Alert id
    pub id: u64,
    /// Metric that crossed its threshold
    pub metric: String,
    /// Observed value
    pub value: f64,
    /// Configured threshold
    pub threshold: f64,
    /// Level by ratio
    pub level: AlertLevel,
    /// Human-readable description
    pub message: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
    /// When the alert was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Whether the alert is still open
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Counts of raised alerts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertSummary {
    /// Alerts raised since start
    pub total: usize,
    /// Alerts still open
    pub active: usize,
    /// Alerts resolved
    pub resolved: usize,
    /// Open alerts per level
    pub active_by_level: BTreeMap<AlertLevel, usize>,
    /// Open alerts
    pub active_alerts: Vec<Alert>,
}

#[derive(Debug, Default)]
pub(crate) struct AlertBook {
    pub(crate) thresholds: BTreeMap<String, f64>,
    pub(crate) alerts: Vec<Alert>,
    next_id: u64,
}

impl AlertBook {
    /// Raise an alert for `metric` unless one is already open
    pub(crate) fn raise(&mut self, metric: &str, value: f64, threshold: f64) -> Option<Alert> {
        if self
            .alerts
            .iter()
            .any(|a| a.is_active() && a.metric == metric)
        {
            return None;
        }
        self.next_id += 1;
        let level = AlertLevel::for_ratio(value, threshold);
        let alert = Alert {
            id: self.next_id,
            metric: metric.to_string(),
            value,
            threshold,
            level,
            message: format!(
                "{} is {:.2}, above threshold {:.2}",
                metric, value, threshold
            ),
            raised_at: Utc::now(),
            resolved_at: None,
        };
        self.alerts.push(alert.clone());
        Some(alert)
    }

    pub(crate) fn resolve(&mut self, id: u64) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                if alert.resolved_at.is_none() {
                    alert.resolved_at = Some(Utc::now());
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn summary(&self) -> AlertSummary {
        let active_alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        let mut active_by_level = BTreeMap::new();
        for alert in &active_alerts {
            *active_by_level.entry(alert.level).or_insert(0) += 1;
        }
        AlertSummary {
            total: self.alerts.len(),
            active: active_alerts.len(),
            resolved: self.alerts.len() - active_alerts.len(),
            active_by_level,
            active_alerts,
        }
    }
}
