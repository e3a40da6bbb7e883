//! Unit tests for the fault taxonomy

use core_types::{FaultCategory, FaultCode, RuntimeFault, Severity};

#[cfg(test)]
mod fault_code_tests {
    use super::*;

    #[test]
    fn test_every_constant_in_its_band() {
        let codes = [
            (FaultCode::INTERNAL, FaultCategory::Runtime),
            (FaultCode::COMPONENT_UNAVAILABLE, FaultCategory::Runtime),
            (FaultCode::JIT_COMPILATION_FAILED, FaultCategory::Compilation),
            (FaultCode::GPU_UNAVAILABLE, FaultCategory::Compilation),
            (FaultCode::UNSUPPORTED_CONSTRUCT, FaultCategory::Compilation),
            (FaultCode::STACK_UNDERFLOW, FaultCategory::Execution),
            (FaultCode::SYMBOL_NOT_FOUND, FaultCategory::Execution),
            (FaultCode::OUT_OF_MEMORY, FaultCategory::Memory),
            (FaultCode::STACK_OVERFLOW, FaultCategory::Memory),
            (FaultCode::TYPE_MISMATCH, FaultCategory::Type),
            (FaultCode::SECURITY_VIOLATION, FaultCategory::Security),
            (FaultCode::TIMEOUT, FaultCategory::Network),
            (FaultCode::STORAGE_UNAVAILABLE, FaultCategory::Storage),
            (FaultCode::INVALID_CONFIGURATION, FaultCategory::Configuration),
        ];
        for (code, category) in codes {
            assert_eq!(code.category(), category, "{}", code);
            let start = category.band_start();
            assert!(code.raw() >= start && code.raw() < start + 1000);
        }
    }

    #[test]
    fn test_new_rejects_out_of_band() {
        assert!(FaultCode::new(0).is_none());
        assert!(FaultCode::new(999).is_none());
        assert!(FaultCode::new(10_000).is_none());
        assert_eq!(FaultCode::new(5999).map(FaultCode::category), Some(FaultCategory::Type));
    }

    #[test]
    fn test_display_format() {
        assert_eq!(FaultCode::DIVISION_BY_ZERO.to_string(), "E3003");
        assert_eq!(FaultCategory::Storage.to_string(), "storage");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}

#[cfg(test)]
mod runtime_fault_tests {
    use super::*;

    #[test]
    fn test_mapping_is_deterministic() {
        let fault = RuntimeFault::SymbolNotFound("nope".to_string());
        assert_eq!(fault.code(), fault.clone().code());
        assert_eq!(fault.code(), FaultCode::SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_messages_name_the_subject() {
        let fault = RuntimeFault::ArityMismatch {
            name: "add".to_string(),
            expected: 2,
            found: 3,
        };
        let message = fault.to_string();
        assert!(message.contains("add"));
        assert!(message.contains('2'));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_host_failure_is_runtime_category() {
        let fault = RuntimeFault::HostFailure {
            name: "fetch".to_string(),
            message: "refused".to_string(),
        };
        assert_eq!(fault.category(), FaultCategory::Runtime);
        assert_eq!(
            RuntimeFault::Marshalling("ptr".to_string()).category(),
            FaultCategory::Type
        );
    }
}
