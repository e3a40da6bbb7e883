//! End-to-end compilation tests

use super::fixtures::{polynomial, scaled_pair, sum_below};
use core_types::{FaultCode, RegionId, RuntimeFault, Value};
use jit_compiler::{
    BackendMode, BackendTarget, CompileError, JitCompiler, JitConfig, SimulatedGpu,
};
use std::sync::Arc;
use telemetry::{names, MetricRegistry};

fn cpu_jit() -> JitCompiler {
    JitCompiler::new(JitConfig::default(), Arc::new(MetricRegistry::default()))
}

#[test]
fn test_loop_compiles_and_unrolls() {
    let jit = cpu_jit();
    let compiled = jit.compile(RegionId(1), &sum_below(), 1).unwrap();
    for n in 0..20i64 {
        assert_eq!(
            compiled.invoke(&[Value::Int(n)]).unwrap(),
            Value::Int(n * (n - 1) / 2),
            "n = {n}"
        );
    }
    let unrolled = compiled
        .passes()
        .iter()
        .find(|r| r.pass == "loop_unrolling")
        .map(|r| r.rewrites);
    assert_eq!(unrolled, Some(1));
    assert_eq!(jit.stats().pass_rewrites["loop_unrolling"], 1);
}

#[test]
fn test_cse_fires_on_repeated_sum() {
    let jit = cpu_jit();
    let compiled = jit.compile(RegionId(2), &polynomial(), 2).unwrap();
    let cse = compiled.passes().iter().find(|r| r.pass == "cse").unwrap();
    assert!(cse.rewrites >= 1);
    assert_eq!(
        compiled.invoke(&[Value::Int(6), Value::Int(3)]).unwrap(),
        Value::Int(79)
    );
}

#[test]
fn test_compiled_faults_match_interpreter_codes() {
    let jit = cpu_jit();
    let compiled = jit.compile(RegionId(3), &polynomial(), 2).unwrap();
    let fault = compiled
        .invoke(&[Value::Int(1), Value::Int(0)])
        .unwrap_err();
    assert_eq!(fault, RuntimeFault::DivisionByZero);
    assert_eq!(fault.code(), FaultCode::DIVISION_BY_ZERO);
}

#[test]
fn test_gpu_outlines_vector_chain() {
    let device = Arc::new(SimulatedGpu::new("sim0"));
    let jit = JitCompiler::with_gpu(
        JitConfig {
            backend: BackendMode::Gpu,
            ..JitConfig::default()
        },
        Arc::new(MetricRegistry::default()),
        device.clone(),
    );
    let compiled = jit.compile(RegionId(4), &scaled_pair(), 3).unwrap();
    assert_eq!(compiled.target(), BackendTarget::Gpu);
    assert_eq!(compiled.code().kernel_count(), 1);

    let result = compiled
        .invoke(&[Value::Int(1), Value::Int(2), Value::Int(10)])
        .unwrap();
    assert_eq!(result, Value::List(vec![Value::Int(20), Value::Int(30)]));
    assert_eq!(device.launches(), 1);
}

#[test]
fn test_cpu_runs_vector_chain_without_kernels() {
    let jit = cpu_jit();
    let compiled = jit.compile(RegionId(5), &scaled_pair(), 3).unwrap();
    assert_eq!(compiled.code().kernel_count(), 0);
    assert_eq!(
        compiled
            .invoke(&[Value::Int(1), Value::Int(2), Value::Int(10)])
            .unwrap(),
        Value::List(vec![Value::Int(20), Value::Int(30)])
    );
}

#[test]
fn test_gpu_mode_without_device_fails_recoverably() {
    let registry = Arc::new(MetricRegistry::default());
    let jit = JitCompiler::new(
        JitConfig {
            backend: BackendMode::Gpu,
            ..JitConfig::default()
        },
        registry.clone(),
    );
    let err = jit.compile(RegionId(6), &polynomial(), 2).unwrap_err();
    assert_eq!(err, CompileError::GpuUnavailable);
    assert_eq!(err.code(), FaultCode::GPU_UNAVAILABLE);
    assert_eq!(registry.total(names::JIT_FAILURES), 1.0);
    assert!(jit.compiled(RegionId(6)).is_none());
}

#[test]
fn test_compile_time_recorded() {
    let registry = Arc::new(MetricRegistry::default());
    let jit = JitCompiler::new(JitConfig::default(), registry.clone());
    jit.compile(RegionId(7), &sum_below(), 1).unwrap();
    assert_eq!(registry.summary(names::JIT_COMPILE_TIME).unwrap().count, 1);
    assert_eq!(registry.total(names::JIT_COMPILATIONS), 1.0);
}
