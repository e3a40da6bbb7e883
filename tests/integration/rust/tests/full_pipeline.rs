//! Full pipeline tests: interpreter, profiler, JIT and telemetry together

use core_types::{PromotionState, Value};
use integration_tests::{call_loop, scaled_pair, square};
use interpreter::{Runtime, RuntimeConfig};
use jit_compiler::{BackendTarget, SimulatedGpu};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use telemetry::{names, MetricKind};

/// Test: a function called 150 times with threshold 100 compiles once
#[test]
fn test_hot_function_compiles_once() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let region = runtime.register_function(square());
    let mut vm = runtime.vm();

    let result = vm.execute(&call_loop("square", 150)).unwrap();
    assert_eq!(result, Value::Int(1_113_775));

    let jit = runtime.jit();
    assert_eq!(jit.stats().compilations, 1);
    assert_eq!(jit.state(region), PromotionState::Compiled);
    assert_eq!(jit.execution_count(region), 150);
    assert_eq!(vm.stats().user_calls, 100);
    assert_eq!(vm.stats().compiled_calls, 50);
    assert_eq!(runtime.telemetry().total(names::JIT_COMPILATIONS), 1.0);
}

/// Test: concurrent chains share one profile and one compilation
#[test]
fn test_concurrent_chains_share_profile() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let region = runtime.register_function(square());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let mut vm = runtime.vm();
            thread::spawn(move || {
                let result = vm.execute(&call_loop("square", 50)).unwrap();
                (result, vm.stats())
            })
        })
        .collect();

    let mut calls = 0;
    for worker in workers {
        let (result, stats) = worker.join().unwrap();
        assert_eq!(result, Value::Int(40_425));
        calls += stats.user_calls + stats.compiled_calls;
    }
    assert_eq!(calls, 200);
    assert_eq!(runtime.jit().execution_count(region), 200);
    assert_eq!(runtime.jit().stats().compilations, 1);
}

/// Test: vector code lands on the GPU backend
#[test]
fn test_gpu_backend_through_runtime() {
    let config = RuntimeConfig::from_toml_str(
        r#"
        [jit]
        hot_threshold = 1
        backend = "gpu"
        "#,
    )
    .unwrap();
    let device = Arc::new(SimulatedGpu::new("sim0"));
    let runtime = Runtime::with_gpu(config, device.clone()).unwrap();
    let region = runtime.register_function(scaled_pair());

    let mut vm = runtime.vm();
    let expected = Value::List(vec![Value::Int(20), Value::Int(30)]);
    for _ in 0..2 {
        let result = vm
            .call_function("scaled_pair", vec![Value::Int(1), Value::Int(2), Value::Int(10)])
            .unwrap();
        assert_eq!(result, expected);
    }

    let compiled = runtime.jit().compiled(region).unwrap();
    assert_eq!(compiled.target(), BackendTarget::Gpu);
    assert_eq!(device.launches(), 1);
    assert_eq!(vm.stats().compiled_calls, 1);
}

/// Test: percentiles over 1..=100 use nearest rank
#[test]
fn test_metric_percentiles() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let telemetry = runtime.telemetry();
    telemetry.register_metric("request_latency", MetricKind::Histogram, "latency", "ms");
    for v in 1..=100 {
        telemetry
            .record_value("request_latency", f64::from(v), None)
            .unwrap();
    }
    let summary = telemetry.summary("request_latency").unwrap();
    assert_eq!(summary.p50, Some(50.0));
    assert_eq!(summary.p95, Some(95.0));
    assert_eq!(summary.p99, Some(99.0));
    assert_eq!(summary.average, Some(50.5));
    assert_eq!(summary.count, 100);
}

/// Test: the performance report serializes and carries VM metrics
#[test]
fn test_performance_report_serializes() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    runtime.register_function(square());
    let mut vm = runtime.vm();
    vm.call_function("square", vec![Value::Int(3)]).unwrap();

    let report = serde_json::to_value(runtime.performance_report()).unwrap();
    assert_eq!(
        report["metrics"][names::VM_EXECUTE_TIME]["count"],
        serde_json::json!(1)
    );
    assert!(report["instructions_per_second"].is_number());
}

/// Test: the collector samples in the background and stops on shutdown
#[test]
fn test_collector_lifecycle() {
    let config = RuntimeConfig::from_toml_str(
        r#"
        [telemetry]
        collector_enabled = true
        collector_interval_ms = 5
        "#,
    )
    .unwrap();
    let runtime = Runtime::new(config).unwrap();
    assert!(runtime.collector_running());
    thread::sleep(Duration::from_millis(20));
    assert!(runtime.shutdown());
}
