//! The metric registry
//!
//! Structural changes (registering a metric, alert bookkeeping) take the
//! registry-wide lock; recording a sample only takes the target metric's own
//! lock after a shared read of the name map.

use crate::alerts::{Alert, AlertBook, AlertSummary};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::metric::{Metric, MetricKind, Tags};
use crate::names;
use crate::report::PerformanceReport;
use crate::stats::{self, MetricSummary};
use crate::timer::TimerGuard;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Named metrics, derived queries and threshold alerts
#[derive(Debug)]
pub struct MetricRegistry {
    config: TelemetryConfig,
    metrics: RwLock<HashMap<String, Arc<Metric>>>,
    alerts: Mutex<AlertBook>,
    started: Instant,
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            metrics: RwLock::new(HashMap::new()),
            alerts: Mutex::new(AlertBook::default()),
            started: Instant::now(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Register a metric, or return the existing one with the same name.
    ///
    /// Re-registering under a different kind keeps the original and logs a
    /// warning; use [`MetricRegistry::try_register_metric`] to observe that.
    pub fn register_metric(
        &self,
        name: &str,
        kind: MetricKind,
        description: &str,
        unit: &str,
    ) -> Arc<Metric> {
        match self.try_register_metric(name, kind, description, unit) {
            Ok(metric) => metric,
            Err(err) => {
                warn!(metric = name, %err, "metric kept its original kind");
                self.metric(name)
                    .unwrap_or_else(|| Arc::new(Metric::new(name, kind, description, unit, 1)))
            }
        }
    }

    /// Register a metric, failing if it exists with a different kind
    pub fn try_register_metric(
        &self,
        name: &str,
        kind: MetricKind,
        description: &str,
        unit: &str,
    ) -> Result<Arc<Metric>, TelemetryError> {
        if let Some(existing) = self.metric(name) {
            return check_kind(existing, kind);
        }
        let mut metrics = self.metrics.write();
        if let Some(existing) = metrics.get(name) {
            return check_kind(existing.clone(), kind);
        }
        let metric = Arc::new(Metric::new(
            name,
            kind,
            description,
            unit,
            self.config.buffer_capacity,
        ));
        metrics.insert(name.to_string(), metric.clone());
        debug!(metric = name, %kind, "metric registered");
        Ok(metric)
    }

    /// Register the metrics the runtime itself writes
    pub fn register_runtime_metrics(&self) {
        use MetricKind::*;
        let builtin = [
            (names::VM_INSTRUCTIONS, Counter, "instructions interpreted", "instructions"),
            (names::FAULTS_TOTAL, Counter, "faults routed to the fault handler", "faults"),
            (names::VM_EXECUTE_TIME, Timer, "wall-clock time per execute call", "ms"),
            (names::VM_CALL_TIME, Timer, "wall-clock time per user function call", "ms"),
            (names::VM_STACK_DEPTH, Gauge, "deepest operand stack per execution", "values"),
            (names::VM_COMPILED_CALLS, Counter, "calls dispatched to compiled regions", "calls"),
            (names::JIT_COMPILATIONS, Counter, "successful region compilations", "regions"),
            (names::JIT_COMPILE_TIME, Timer, "time spent compiling one region", "ms"),
            (names::JIT_FAILURES, Counter, "failed region compilations", "regions"),
        ];
        for (name, kind, description, unit) in builtin {
            self.register_metric(name, kind, description, unit);
        }
    }

    /// Look up a metric
    pub fn metric(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.read().get(name).cloned()
    }

    fn require(&self, name: &str) -> Result<Arc<Metric>, TelemetryError> {
        self.metric(name)
            .ok_or_else(|| TelemetryError::NotRegistered(name.to_string()))
    }

    /// Append a timestamped sample; counters take an increment
    pub fn record_value(
        &self,
        name: &str,
        value: f64,
        tags: Option<Tags>,
    ) -> Result<(), TelemetryError> {
        if !self.config.enabled {
            return Ok(());
        }
        self.require(name)?.record(value, tags)
    }

    /// Add `delta` to a counter
    pub fn increment(&self, name: &str, delta: u64) -> Result<(), TelemetryError> {
        self.record_value(name, delta as f64, None)
    }

    /// Newest stored value
    pub fn latest(&self, name: &str) -> Result<Option<f64>, TelemetryError> {
        Ok(self.require(name)?.latest())
    }

    /// Counter total (or newest value for other kinds); zero if unregistered
    pub fn total(&self, name: &str) -> f64 {
        self.metric(name).map_or(0.0, |m| m.total())
    }

    /// Mean of the newest `window` samples (all retained when `None`)
    pub fn average(&self, name: &str, window: Option<usize>) -> Result<Option<f64>, TelemetryError> {
        Ok(stats::mean(&self.require(name)?.values(), window))
    }

    /// Nearest-rank percentile over retained samples
    pub fn percentile(&self, name: &str, p: f64) -> Result<Option<f64>, TelemetryError> {
        Ok(stats::percentile(&self.require(name)?.values(), p))
    }

    /// Summary of one metric
    pub fn summary(&self, name: &str) -> Result<MetricSummary, TelemetryError> {
        let metric = self.require(name)?;
        Ok(MetricSummary::of(&metric))
    }

    /// Summary of every metric, keyed by name
    pub fn get_metrics_summary(&self) -> BTreeMap<String, MetricSummary> {
        let metrics: Vec<Arc<Metric>> = self.metrics.read().values().cloned().collect();
        metrics
            .iter()
            .map(|m| (m.name().to_string(), MetricSummary::of(m)))
            .collect()
    }

    /// Names of registered metrics, sorted
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Start a scoped timer for `name`
    pub fn start_timer<'a>(&'a self, name: &'a str) -> TimerGuard<'a> {
        TimerGuard::new(self, name)
    }

    /// Run `f`, recording its duration under `name` whatever it returns
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let _guard = self.start_timer(name);
        f()
    }

    /// Time since the registry was created
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Interpreted instructions per second of uptime
    pub fn instructions_per_second(&self) -> f64 {
        let secs = self.uptime().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total(names::VM_INSTRUCTIONS) / secs
    }

    /// Faults per interpreted instruction; zero before any instruction runs
    pub fn error_rate(&self) -> f64 {
        let instructions = self.total(names::VM_INSTRUCTIONS);
        if instructions <= 0.0 {
            return 0.0;
        }
        self.total(names::FAULTS_TOTAL) / instructions
    }

    /// Alert when `metric`'s latest value exceeds `threshold`
    pub fn set_alert_threshold(&self, metric: &str, threshold: f64) {
        self.alerts
            .lock()
            .thresholds
            .insert(metric.to_string(), threshold);
    }

    /// Raise alerts for metrics above their thresholds; returns new alerts
    pub fn check_alerts(&self) -> Vec<Alert> {
        let thresholds = self.alerts.lock().thresholds.clone();
        let over: Vec<(String, f64, f64)> = thresholds
            .into_iter()
            .filter_map(|(name, threshold)| {
                let latest = self.metric(&name)?.latest()?;
                (latest > threshold).then_some((name, latest, threshold))
            })
            .collect();

        let mut book = self.alerts.lock();
        let raised: Vec<Alert> = over
            .into_iter()
            .filter_map(|(name, value, threshold)| book.raise(&name, value, threshold))
            .collect();
        for alert in &raised {
            warn!(metric = %alert.metric, level = ?alert.level, value = alert.value, "alert raised");
        }
        raised
    }

    /// Mark an alert resolved
    pub fn resolve_alert(&self, id: u64) -> Result<(), TelemetryError> {
        if self.alerts.lock().resolve(id) {
            Ok(())
        } else {
            Err(TelemetryError::UnknownAlert(id))
        }
    }

    /// Counts of raised, open and resolved alerts
    pub fn alerts_summary(&self) -> AlertSummary {
        self.alerts.lock().summary()
    }

    /// Summaries, derived rates and alerts in one serializable report
    pub fn performance_report(&self) -> PerformanceReport {
        PerformanceReport {
            generated_at: Utc::now(),
            uptime_secs: self.uptime().as_secs_f64(),
            instructions_per_second: self.instructions_per_second(),
            error_rate: self.error_rate(),
            metrics: self.get_metrics_summary(),
            alerts: self.alerts_summary(),
        }
    }

    /// Drop every sample; registrations and thresholds stay
    pub fn reset(&self) {
        for metric in self.metrics.read().values() {
            metric.clear();
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

fn check_kind(existing: Arc<Metric>, kind: MetricKind) -> Result<Arc<Metric>, TelemetryError> {
    if existing.kind() == kind {
        Ok(existing)
    } else {
        Err(TelemetryError::KindMismatch {
            name: existing.name().to_string(),
            registered: existing.kind().to_string(),
            requested: kind.to_string(),
        })
    }
}
