//! Metrics and their sample buffers

use crate::error::TelemetryError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Optional key/value tags attached to a sample
pub type Tags = BTreeMap<String, String>;

/// Kind of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonically increasing total; samples are increments
    Counter,
    /// Last written value
    Gauge,
    /// Distribution of observed values
    Histogram,
    /// Distribution of durations in milliseconds
    Timer,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
        };
        f.write_str(name)
    }
}

/// One timestamped observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// When the value was recorded
    pub timestamp: DateTime<Utc>,
    /// Stored value; for counters, the running total after the increment
    pub value: f64,
    /// Optional tags
    pub tags: Option<Tags>,
}

/// Fixed-capacity FIFO that overwrites its oldest entry
///
/// # Examples
///
/// ```
/// use telemetry::RingBuffer;
///
/// let mut ring = RingBuffer::new(2);
/// ring.push(1);
/// ring.push(2);
/// ring.push(3);
/// assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest item when full
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Items oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Newest item
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Number of retained items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of retained items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every item
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug)]
struct MetricState {
    samples: RingBuffer<Sample>,
    total: f64,
    recorded: u64,
}

/// A registered metric with its own narrow lock
#[derive(Debug)]
pub struct Metric {
    name: String,
    kind: MetricKind,
    description: String,
    unit: String,
    state: Mutex<MetricState>,
}

impl Metric {
    /// Create a metric retaining `capacity` samples
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        description: impl Into<String>,
        unit: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            unit: unit.into(),
            state: Mutex::new(MetricState {
                samples: RingBuffer::new(capacity),
                total: 0.0,
                recorded: 0,
            }),
        }
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metric kind
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unit label
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Append a sample.
    ///
    /// Counters take a non-negative increment and store the running total.
    pub fn record(&self, value: f64, tags: Option<Tags>) -> Result<(), TelemetryError> {
        if !value.is_finite() {
            return Err(self.invalid("value is not finite"));
        }
        if self.kind == MetricKind::Counter && value < 0.0 {
            return Err(self.invalid("counter increments must be non-negative"));
        }

        let mut state = self.state.lock();
        let stored = if self.kind == MetricKind::Counter {
            state.total += value;
            state.total
        } else {
            value
        };
        state.recorded += 1;
        state.samples.push(Sample {
            timestamp: Utc::now(),
            value: stored,
            tags,
        });
        Ok(())
    }

    fn invalid(&self, reason: &str) -> TelemetryError {
        TelemetryError::InvalidValue {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Newest stored value
    pub fn latest(&self) -> Option<f64> {
        self.state.lock().samples.last().map(|s| s.value)
    }

    /// Counter total; for other kinds the newest value
    pub fn total(&self) -> f64 {
        let state = self.state.lock();
        match self.kind {
            MetricKind::Counter => state.total,
            _ => state.samples.last().map(|s| s.value).unwrap_or(0.0),
        }
    }

    /// Samples recorded over the metric's lifetime, evicted ones included
    pub fn recorded(&self) -> u64 {
        self.state.lock().recorded
    }

    /// Copy of the retained samples, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.state.lock().samples.iter().cloned().collect()
    }

    /// Copy of the retained values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.state.lock().samples.iter().map(|s| s.value).collect()
    }

    /// Drop samples and zero the total
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.samples.clear();
        state.total = 0.0;
        state.recorded = 0;
    }
}
