//! Performance telemetry for the runtime
//!
//! A [`MetricRegistry`] holds named counters, gauges, histograms and timers.
//! Each metric keeps a fixed-capacity ring buffer of timestamped samples.
//! Writes only append; every derived figure (latest, mean, percentiles) is
//! computed when it is read.
//!
//! # Overview
//!
//! - [`MetricRegistry`] - Registration, recording and queries
//! - [`TimerGuard`] - Scoped timer that records on every exit path
//! - [`Collector`] - Cancellable background sampler of process probes
//! - [`alerts`] - Threshold alerts over latest values
//!
//! # Examples
//!
//! ```
//! use telemetry::{MetricKind, MetricRegistry, TelemetryConfig};
//!
//! let registry = MetricRegistry::new(TelemetryConfig::default());
//! registry.register_metric("latency", MetricKind::Histogram, "request latency", "ms");
//! for v in 1..=100 {
//!     registry.record_value("latency", v as f64, None).unwrap();
//! }
//! let summary = &registry.get_metrics_summary()["latency"];
//! assert_eq!(summary.p95, Some(95.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alerts;
pub mod collector;
pub mod config;
pub mod error;
pub mod metric;
pub mod names;
pub mod registry;
pub mod report;
pub mod stats;
pub mod timer;

pub use alerts::{Alert, AlertLevel, AlertSummary};
pub use collector::{Collector, GpuProbe, MemoryProbe, SystemProbe, UtilizationSource};
pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use metric::{Metric, MetricKind, RingBuffer, Sample, Tags};
pub use registry::MetricRegistry;
pub use report::PerformanceReport;
pub use stats::MetricSummary;
pub use timer::TimerGuard;
