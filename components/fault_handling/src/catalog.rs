//! Fault code catalog
//!
//! Maps each [`FaultCode`] to its symbolic name, default severity, whether
//! recovery may be attempted, a remediation hint and the strategy used when
//! a request asks for automatic recovery without naming one. Codes may be
//! added or overridden at runtime.

use core_types::{FaultCode, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// Static description of one fault code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultDescriptor {
    /// The code described
    pub code: FaultCode,
    /// Symbolic name, e.g. `stack_underflow`
    pub name: String,
    /// Severity when the request does not override it
    pub default_severity: Severity,
    /// Whether recovery may be attempted; otherwise the fault propagates
    pub recoverable: bool,
    /// Operator-facing remediation hint
    pub remediation: String,
    /// Strategy used by `auto_recover` when none is named
    pub default_strategy: Option<String>,
}

impl FaultDescriptor {
    /// Create a descriptor with no default strategy
    pub fn new(
        code: FaultCode,
        name: impl Into<String>,
        default_severity: Severity,
        recoverable: bool,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            code,
            name: name.into(),
            default_severity,
            recoverable,
            remediation: remediation.into(),
            default_strategy: None,
        }
    }

    /// Set the default recovery strategy
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.default_strategy = Some(strategy.into());
        self
    }

    fn unclassified(code: FaultCode) -> Self {
        Self::new(
            code,
            format!("unclassified_{}", code.category()),
            Severity::Medium,
            true,
            "register a descriptor for this code",
        )
    }
}

/// Registry of fault descriptors keyed by code
#[derive(Debug, Clone)]
pub struct FaultCatalog {
    entries: BTreeMap<FaultCode, FaultDescriptor>,
}

impl FaultCatalog {
    /// Create an empty catalog
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a descriptor, returning the previous one
    pub fn register(&mut self, descriptor: FaultDescriptor) -> Option<FaultDescriptor> {
        self.entries.insert(descriptor.code, descriptor)
    }

    /// Descriptor for `code`, if registered
    pub fn get(&self, code: FaultCode) -> Option<&FaultDescriptor> {
        self.entries.get(&code)
    }

    /// Descriptor for `code`, synthesizing a generic one for unknown codes
    pub fn describe(&self, code: FaultCode) -> FaultDescriptor {
        self.entries
            .get(&code)
            .cloned()
            .unwrap_or_else(|| FaultDescriptor::unclassified(code))
    }

    /// Number of registered codes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no codes are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate descriptors in code order
    pub fn iter(&self) -> impl Iterator<Item = &FaultDescriptor> {
        self.entries.values()
    }
}

impl Default for FaultCatalog {
    fn default() -> Self {
        use FaultCode as C;
        use Severity::*;

        let mut catalog = Self::empty();
        let builtin = [
            FaultDescriptor::new(C::INTERNAL, "internal_error", High, false, "report an engine bug with the captured trace"),
            FaultDescriptor::new(C::STATE_CORRUPTION, "state_corruption", Critical, false, "discard the call chain and restart the engine"),
            FaultDescriptor::new(C::HOST_FUNCTION_FAILED, "host_function_failed", Medium, true, "check the host binding and its inputs")
                .with_strategy("retry"),
            FaultDescriptor::new(C::COMPONENT_UNAVAILABLE, "component_unavailable", Medium, true, "wait for the circuit to half-open or reset it")
                .with_strategy("circuit_breaker"),
            FaultDescriptor::new(C::JIT_COMPILATION_FAILED, "jit_compilation_failed", Medium, true, "region keeps running interpreted")
                .with_strategy("fallback"),
            FaultDescriptor::new(C::IR_TRANSLATION_FAILED, "ir_translation_failed", Medium, true, "region keeps running interpreted")
                .with_strategy("fallback"),
            FaultDescriptor::new(C::OPTIMIZATION_DEGRADED, "optimization_degraded", Low, true, "pass skipped; output remains correct")
                .with_strategy("degrade"),
            FaultDescriptor::new(C::BACKEND_LOWERING_FAILED, "backend_lowering_failed", Medium, true, "try the CPU backend")
                .with_strategy("fallback"),
            FaultDescriptor::new(C::GPU_UNAVAILABLE, "gpu_unavailable", Low, true, "attach a GPU device or select the CPU backend")
                .with_strategy("fallback"),
            FaultDescriptor::new(C::UNSUPPORTED_CONSTRUCT, "unsupported_construct", Low, true, "region keeps running interpreted")
                .with_strategy("fallback"),
            FaultDescriptor::new(C::STACK_UNDERFLOW, "stack_underflow", High, true, "check the arity the front end emitted"),
            FaultDescriptor::new(C::SYMBOL_NOT_FOUND, "symbol_not_found", High, true, "register the function before calling it"),
            FaultDescriptor::new(C::DIVISION_BY_ZERO, "division_by_zero", High, true, "guard the divisor"),
            FaultDescriptor::new(C::ARITHMETIC_OVERFLOW, "arithmetic_overflow", High, true, "use floats or smaller operands"),
            FaultDescriptor::new(C::INVALID_JUMP_TARGET, "invalid_jump_target", High, true, "regenerate the bytecode"),
            FaultDescriptor::new(C::INVALID_CONSTANT, "invalid_constant", High, true, "regenerate the bytecode"),
            FaultDescriptor::new(C::UNDEFINED_NAME, "undefined_name", High, true, "assign the variable before reading it"),
            FaultDescriptor::new(C::ARITY_MISMATCH, "arity_mismatch", High, true, "pass the declared number of arguments"),
            FaultDescriptor::new(C::OUT_OF_MEMORY, "out_of_memory", Critical, true, "reduce working set or raise limits")
                .with_strategy("degrade"),
            FaultDescriptor::new(C::HEAP_CORRUPTION, "heap_corruption", Critical, false, "shut the runtime down"),
            FaultDescriptor::new(C::STACK_OVERFLOW, "stack_overflow", High, true, "reduce recursion depth or raise max_call_depth"),
            FaultDescriptor::new(C::TYPE_MISMATCH, "type_mismatch", Medium, true, "convert operands before the operation"),
            FaultDescriptor::new(C::MARSHALLING_FAILED, "marshalling_failed", Medium, true, "pass values the bridge can represent"),
            FaultDescriptor::new(C::SECURITY_VIOLATION, "security_violation", Critical, false, "isolate the caller"),
            FaultDescriptor::new(C::CONNECTION_FAILED, "connection_failed", Medium, true, "check connectivity")
                .with_strategy("retry"),
            FaultDescriptor::new(C::TIMEOUT, "timeout", Medium, true, "raise the timeout or retry later")
                .with_strategy("retry"),
            FaultDescriptor::new(C::STORAGE_UNAVAILABLE, "storage_unavailable", High, true, "check the storage backend")
                .with_strategy("retry"),
            FaultDescriptor::new(C::QUERY_FAILED, "query_failed", Medium, true, "inspect the failing query")
                .with_strategy("retry"),
            FaultDescriptor::new(C::INVALID_CONFIGURATION, "invalid_configuration", High, false, "fix the configuration and restart"),
            FaultDescriptor::new(C::METRIC_NOT_REGISTERED, "metric_not_registered", Low, true, "register the metric first"),
        ];
        for descriptor in builtin {
            catalog.register(descriptor);
        }
        catalog
    }
}
