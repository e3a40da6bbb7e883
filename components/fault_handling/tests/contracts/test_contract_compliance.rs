//! Contract compliance tests for fault_handling

use core_types::FaultCode;
use fault_handling::{FaultConfig, FaultHandler, FaultRequest};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const CODES: [FaultCode; 6] = [
    FaultCode::INTERNAL,
    FaultCode::STACK_UNDERFLOW,
    FaultCode::SYMBOL_NOT_FOUND,
    FaultCode::TYPE_MISMATCH,
    FaultCode::TIMEOUT,
    FaultCode::STORAGE_UNAVAILABLE,
];

proptest! {
    /// Each call increments its code's counter by exactly one.
    #[test]
    fn prop_handle_fault_counts_exactly(picks in proptest::collection::vec(0usize..CODES.len(), 0..64)) {
        let handler = FaultHandler::default();
        for &i in &picks {
            let before = handler.get_error_metrics().count(CODES[i]);
            handler.handle_fault(FaultRequest::code(CODES[i]));
            prop_assert_eq!(handler.get_error_metrics().count(CODES[i]), before + 1);
        }
        prop_assert_eq!(handler.total_faults(), picks.len() as u64);
        handler.clear_error_history();
        let metrics = handler.get_error_metrics();
        prop_assert!(CODES.iter().all(|c| metrics.count(*c) == 0));
    }

    /// Retry never calls the operation more than max_attempts times.
    #[test]
    fn prop_retry_bounded(max_attempts in 1u32..6) {
        let handler = FaultHandler::new(FaultConfig {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            ..FaultConfig::default()
        });
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = calls.clone();
        let report = handler.handle_fault(
            FaultRequest::code(FaultCode::TIMEOUT)
                .operation(move || {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Err("down".to_string())
                })
                .auto_recover(true),
        );
        prop_assert!(!report.recovered());
        prop_assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), max_attempts);
    }
}

/// Counters stay exact under concurrent producers.
#[test]
fn test_contract_concurrent_accounting() {
    let handler = Arc::new(FaultHandler::default());
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let handler = handler.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    handler.handle_fault(FaultRequest::code(FaultCode::TIMEOUT));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(handler.get_error_metrics().count(FaultCode::TIMEOUT), 1000);
}

/// Records are immutable once returned: later faults never alter them.
#[test]
fn test_contract_records_immutable() {
    let handler = FaultHandler::default();
    let first = handler.handle_fault(FaultRequest::code(FaultCode::TIMEOUT).message("one"));
    handler.handle_fault(FaultRequest::code(FaultCode::TIMEOUT).message("two"));
    assert_eq!(first.message(), "one");
    assert_eq!(handler.history()[0].message, "one");
}
