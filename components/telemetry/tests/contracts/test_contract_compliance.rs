//! Contract compliance tests for telemetry

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use telemetry::{stats, MetricKind, MetricRegistry, RingBuffer, TelemetryConfig};

proptest! {
    /// A ring never holds more than its capacity and keeps the newest items.
    #[test]
    fn prop_ring_keeps_newest(capacity in 1usize..32, items in proptest::collection::vec(any::<i32>(), 0..128)) {
        let mut ring = RingBuffer::new(capacity);
        for &item in &items {
            ring.push(item);
            prop_assert!(ring.len() <= capacity);
        }
        let kept: Vec<i32> = ring.iter().copied().collect();
        let start = items.len().saturating_sub(capacity);
        prop_assert_eq!(kept, items[start..].to_vec());
    }

    /// Percentiles are members of the input and monotone in p.
    #[test]
    fn prop_percentile_monotone(values in proptest::collection::vec(-1e6f64..1e6, 1..200), a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = stats::percentile(&values, lo).unwrap();
        let p_hi = stats::percentile(&values, hi).unwrap();
        prop_assert!(p_lo <= p_hi);
        prop_assert!(values.contains(&p_lo));
        prop_assert!(values.contains(&p_hi));
    }

    /// A counter's total is the sum of its increments.
    #[test]
    fn prop_counter_total(deltas in proptest::collection::vec(0u64..1000, 0..64)) {
        let registry = MetricRegistry::default();
        registry.register_metric("c", MetricKind::Counter, "", "");
        for &d in &deltas {
            registry.increment("c", d).unwrap();
        }
        prop_assert_eq!(registry.total("c"), deltas.iter().sum::<u64>() as f64);
    }
}

#[test]
fn test_concurrent_recording_loses_nothing() {
    let registry = Arc::new(MetricRegistry::new(TelemetryConfig {
        buffer_capacity: 10_000,
        ..TelemetryConfig::default()
    }));
    registry.register_metric("c", MetricKind::Counter, "", "");
    registry.register_metric("h", MetricKind::Histogram, "", "");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    registry.increment("c", 1).unwrap();
                    registry.record_value("h", f64::from(i), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.total("c"), 4000.0);
    assert_eq!(registry.summary("h").unwrap().count, 4000);
}

#[test]
fn test_concurrent_registration_yields_one_metric() {
    let registry = Arc::new(MetricRegistry::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.register_metric("shared", MetricKind::Gauge, "", ""))
        })
        .collect();
    let metrics: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(metrics.iter().all(|m| Arc::ptr_eq(m, &metrics[0])));
    assert_eq!(registry.metric_names(), vec!["shared".to_string()]);
}
