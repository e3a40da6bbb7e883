//! Tests for FaultHandler accounting

use core_types::{FaultCategory, FaultCode, RuntimeFault, Severity};
use fault_handling::{FaultConfig, FaultDescriptor, FaultHandler, FaultRequest};

#[test]
fn test_category_override() {
    let handler = FaultHandler::default();
    let report = handler.handle_fault(
        FaultRequest::code(FaultCode::INTERNAL).category(FaultCategory::Storage),
    );
    assert_eq!(report.category(), FaultCategory::Storage);
    assert_eq!(
        handler.get_error_metrics().by_category[&FaultCategory::Storage],
        1
    );
}

#[test]
fn test_context_and_trace_recorded() {
    let handler = FaultHandler::default();
    let report = handler.handle_fault(
        FaultRequest::fault(RuntimeFault::DivisionByZero)
            .context("function", "avg")
            .trace(vec!["<main>".to_string(), "avg".to_string()]),
    );
    assert_eq!(report.record.context["function"], "avg");
    assert_eq!(report.record.trace.last().map(String::as_str), Some("avg"));
}

#[test]
fn test_runtime_registered_code() {
    let handler = FaultHandler::default();
    let code = FaultCode::new(8100).unwrap();
    handler.register_fault_code(
        FaultDescriptor::new(code, "replica_lag", Severity::Low, true, "wait")
            .with_strategy("fallback"),
    );
    let report = handler.handle_fault(FaultRequest::code(code).auto_recover(true));
    assert_eq!(report.record.name, "replica_lag");
    assert_eq!(report.severity(), Severity::Low);
    assert!(report.recovered());
}

#[test]
fn test_recent_is_capped_at_ten() {
    let handler = FaultHandler::new(FaultConfig::default());
    for _ in 0..25 {
        handler.handle_fault(FaultRequest::code(FaultCode::TYPE_MISMATCH));
    }
    let metrics = handler.get_error_metrics();
    assert_eq!(metrics.recent.len(), 10);
    assert_eq!(metrics.history_len, 25);
    assert_eq!(metrics.recent.last().map(|r| r.id), Some(25));
}

#[test]
fn test_report_display_carries_code() {
    let handler = FaultHandler::default();
    let report = handler.report(RuntimeFault::StackUnderflow {
        needed: 2,
        available: 0,
    });
    let text = report.to_string();
    assert!(text.contains("E3001"));
    assert!(text.contains("stack_underflow"));
}

#[test]
fn test_metrics_json_export() {
    let handler = FaultHandler::default();
    handler.handle_fault(FaultRequest::code(FaultCode::TIMEOUT));
    let json = serde_json::to_value(handler.get_error_metrics()).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["recent"][0]["name"], "timeout");
}
