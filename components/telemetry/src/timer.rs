//! Scoped timing

use crate::registry::MetricRegistry;
use std::time::Instant;
use tracing::warn;

/// Records elapsed milliseconds into a timer metric when dropped
///
/// Dropping happens on normal return, on `?` early return and during
/// unwinding, so the sample is recorded on every exit path.
///
/// # Examples
///
/// ```
/// use telemetry::{MetricKind, MetricRegistry, TelemetryConfig};
///
/// let registry = MetricRegistry::new(TelemetryConfig::default());
/// registry.register_metric("work", MetricKind::Timer, "unit of work", "ms");
/// {
///     let _timer = registry.start_timer("work");
/// }
/// assert_eq!(registry.summary("work").unwrap().count, 1);
/// ```
#[must_use = "the timer records when dropped"]
pub struct TimerGuard<'a> {
    registry: &'a MetricRegistry,
    name: &'a str,
    started: Instant,
}

impl<'a> TimerGuard<'a> {
    pub(crate) fn new(registry: &'a MetricRegistry, name: &'a str) -> Self {
        Self {
            registry,
            name,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the guard was created
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.registry.record_value(self.name, self.elapsed_ms(), None) {
            warn!(metric = self.name, %err, "timer sample dropped");
        }
    }
}
