//! Background sampling of process-level probes
//!
//! The collector owns one thread. It samples every probe, then waits on a
//! stop channel for one interval, so a stop request interrupts the wait
//! instead of sleeping through it.

use crate::error::TelemetryError;
use crate::metric::MetricKind;
use crate::names;
use crate::registry::MetricRegistry;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A source of one process-level reading
pub trait SystemProbe: Send + Sync {
    /// Metric the reading is written to
    fn metric(&self) -> &str;

    /// Kind used when the collector registers the metric
    fn kind(&self) -> MetricKind {
        MetricKind::Gauge
    }

    /// Unit label
    fn unit(&self) -> &str;

    /// Take a reading; `None` when unavailable on this platform
    fn sample(&self) -> Option<f64>;
}

/// Resident set size of the current process
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryProbe;

const PAGE_SIZE: f64 = 4096.0;

impl SystemProbe for MemoryProbe {
    fn metric(&self) -> &str {
        names::PROCESS_MEMORY
    }

    fn unit(&self) -> &str {
        "bytes"
    }

    fn sample(&self) -> Option<f64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(resident * PAGE_SIZE)
    }
}

/// Anything that can report a utilization percentage
pub trait UtilizationSource: Send + Sync {
    /// Current utilization in `0.0..=100.0`
    fn utilization(&self) -> Option<f64>;
}

/// Utilization of an accelerator device
#[derive(Clone)]
pub struct GpuProbe {
    source: Arc<dyn UtilizationSource>,
}

impl GpuProbe {
    /// Probe backed by `source`
    pub fn new(source: Arc<dyn UtilizationSource>) -> Self {
        Self { source }
    }
}

impl SystemProbe for GpuProbe {
    fn metric(&self) -> &str {
        names::GPU_UTILIZATION
    }

    fn unit(&self) -> &str {
        "percent"
    }

    fn sample(&self) -> Option<f64> {
        self.source.utilization()
    }
}

/// Handle to a running background collector
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use telemetry::{Collector, MemoryProbe, MetricRegistry, SystemProbe};
///
/// let registry = Arc::new(MetricRegistry::default());
/// let probes: Vec<Box<dyn SystemProbe>> = vec![Box::new(MemoryProbe)];
/// let collector = Collector::start(registry, probes, Duration::from_millis(10)).unwrap();
/// assert!(collector.stop(Duration::from_secs(1)));
/// ```
pub struct Collector {
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Collector {
    /// Register each probe's metric and start sampling every `interval`
    pub fn start(
        registry: Arc<MetricRegistry>,
        probes: Vec<Box<dyn SystemProbe>>,
        interval: Duration,
    ) -> Result<Self, TelemetryError> {
        for probe in &probes {
            registry.register_metric(probe.metric(), probe.kind(), "sampled by collector", probe.unit());
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("telemetry-collector".to_string())
            .spawn(move || {
                debug!(probes = probes.len(), ?interval, "collector started");
                loop {
                    sample_all(&registry, &probes);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("collector stopped");
                let _ = done_tx.send(());
            })
            .map_err(|e| TelemetryError::CollectorSpawn(e.to_string()))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Whether the sampling thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait up to `timeout` for it to exit.
    ///
    /// Returns `false` if the thread did not finish in time; it is then
    /// detached and exits after its current sample.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.shutdown(timeout)
    }

    fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("collector thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "collector did not stop in time, detaching");
                false
            }
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(500));
    }
}

fn sample_all(registry: &MetricRegistry, probes: &[Box<dyn SystemProbe>]) {
    for probe in probes {
        let Some(value) = probe.sample() else {
            trace!(metric = probe.metric(), "probe unavailable");
            continue;
        };
        if let Err(err) = registry.record_value(probe.metric(), value, None) {
            warn!(metric = probe.metric(), %err, "probe sample rejected");
        }
    }
}
