//! Read-time statistics over retained samples

use crate::metric::{Metric, MetricKind};
use serde::Serialize;

/// Nearest-rank percentile of `values`.
///
/// Sorts a copy; `p` is clamped to `0..=100`.
///
/// # Examples
///
/// ```
/// use telemetry::stats::percentile;
///
/// let values: Vec<f64> = (1..=100).map(f64::from).collect();
/// assert_eq!(percentile(&values, 50.0), Some(50.0));
/// assert_eq!(percentile(&values, 99.0), Some(99.0));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Arithmetic mean of the newest `window` values (all when `None`)
pub fn mean(values: &[f64], window: Option<usize>) -> Option<f64> {
    let start = window.map_or(0, |w| values.len().saturating_sub(w));
    let tail = &values[start..];
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Derived figures for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    /// Metric kind
    pub kind: MetricKind,
    /// Unit label
    pub unit: String,
    /// Newest value
    pub latest: Option<f64>,
    /// Mean of retained values
    pub average: Option<f64>,
    /// Median
    pub p50: Option<f64>,
    /// 95th percentile
    pub p95: Option<f64>,
    /// 99th percentile
    pub p99: Option<f64>,
    /// Retained sample count
    pub count: usize,
}

impl MetricSummary {
    /// Summarize the retained samples of `metric`
    pub fn of(metric: &Metric) -> Self {
        let mut values = metric.values();
        let latest = values.last().copied();
        let average = mean(&values, None);
        values.sort_by(f64::total_cmp);
        let pick = |p: f64| (!values.is_empty()).then(|| percentile_sorted(&values, p));
        Self {
            kind: metric.kind(),
            unit: metric.unit().to_string(),
            latest,
            average,
            p50: pick(50.0),
            p95: pick(95.0),
            p99: pick(99.0),
            count: values.len(),
        }
    }
}
