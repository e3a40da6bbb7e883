//! Fault handling integration tests: recovery strategies and VM faults

use core_types::{FaultCode, Severity, Value};
use fault_handling::{Disposition, FaultConfig, FaultHandler, FaultRequest};
use interpreter::{Runtime, RuntimeConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn fast_handler() -> FaultHandler {
    FaultHandler::new(FaultConfig {
        base_backoff_ms: 1,
        max_backoff_ms: 4,
        ..FaultConfig::default()
    })
}

/// Test: retry succeeds on the third attempt
#[test]
fn test_retry_until_success() {
    let handler = fast_handler();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let report = handler.handle_fault(
        FaultRequest::code(FaultCode::TIMEOUT)
            .message("peer did not answer")
            .auto_recover(true)
            .operation(move || {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("still down".to_string())
                } else {
                    Ok(Value::Int(7))
                }
            }),
    );

    assert!(report.recovered());
    assert_eq!(report.recovered_value(), Some(&Value::Int(7)));
    let outcome = report.recovery.as_ref().unwrap();
    assert_eq!(outcome.strategy, "retry");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(handler.get_error_metrics().by_code[&FaultCode::TIMEOUT], 1);
}

/// Test: exhausted retries report the last failure
#[test]
fn test_retry_exhausted() {
    let handler = fast_handler();
    let report = handler.handle_fault(
        FaultRequest::code(FaultCode::STORAGE_UNAVAILABLE)
            .auto_recover(true)
            .operation(|| Err("disk offline".to_string())),
    );
    assert!(!report.recovered());
    let outcome = report.recovery.as_ref().unwrap();
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.message.contains("disk offline"));
    assert_eq!(report.disposition, Disposition::Recoverable);
}

/// Test: compile faults fall back to a substitute value
#[test]
fn test_fallback_for_compile_fault() {
    let handler = fast_handler();
    let report = handler.handle_fault(
        FaultRequest::code(FaultCode::JIT_COMPILATION_FAILED)
            .auto_recover(true)
            .fallback_value(Value::Str("interpret".into())),
    );
    assert_eq!(report.recovered_value(), Some(&Value::Str("interpret".into())));
}

/// Test: unrecoverable faults propagate without recovery
#[test]
fn test_unrecoverable_propagates() {
    let handler = fast_handler();
    let report = handler.handle_fault(
        FaultRequest::code(FaultCode::HEAP_CORRUPTION)
            .auto_recover(true)
            .strategy("retry")
            .operation(|| Ok(Value::None)),
    );
    assert_eq!(report.disposition, Disposition::Propagate);
    assert!(report.recovery.is_none());
    assert_eq!(report.severity(), Severity::Critical);
}

/// Test: VM faults reach registered error handlers with their trace
#[test]
fn test_vm_fault_notifies_handler() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let seen = Arc::new(AtomicU32::new(0));
    let counter = seen.clone();
    runtime
        .faults()
        .register_error_handler(FaultCode::DIVISION_BY_ZERO, move |record| {
            assert_eq!(record.trace.first().map(String::as_str), Some("<ratio>"));
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let mut body = bytecode_system::BytecodeChunk::new("ratio");
    body.emit(bytecode_system::Opcode::LoadName("a".into()));
    body.emit(bytecode_system::Opcode::LoadName("b".into()));
    body.emit(bytecode_system::Opcode::BinaryDiv);
    body.emit(bytecode_system::Opcode::ReturnValue);
    runtime.register_function(bytecode_system::FunctionDescriptor::new("ratio", ["a", "b"], body));

    let mut vm = runtime.vm();
    let err = vm
        .call_function("ratio", vec![Value::Int(1), Value::Int(0)])
        .unwrap_err();
    assert_eq!(err.code(), FaultCode::DIVISION_BY_ZERO);
    assert_eq!(err.record.trace, vec!["<ratio>".to_string(), "ratio".to_string()]);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.telemetry().total(telemetry::names::FAULTS_TOTAL), 1.0);
}
