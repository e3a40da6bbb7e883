//! The coded fault taxonomy.
//!
//! Every fault in the runtime is identified by a [`FaultCode`] that lives in
//! a fixed numeric band per [`FaultCategory`]. Native-level failures are
//! expressed as [`RuntimeFault`] and converted to a code with
//! [`RuntimeFault::code`] at the boundary where they occur.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fault category. Each category owns a band of one thousand codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCategory {
    /// 1000-1999: engine-internal and host-level runtime faults
    Runtime,
    /// 2000-2999: JIT translation, optimization and lowering
    Compilation,
    /// 3000-3999: faults raised while executing bytecode
    Execution,
    /// 4000-4999: memory exhaustion, corruption, call depth
    Memory,
    /// 5000-5999: type and marshalling faults
    Type,
    /// 6000-6999: security violations
    Security,
    /// 7000-7999: network transport
    Network,
    /// 8000-8999: storage and database access
    Storage,
    /// 9000-9999: configuration
    Configuration,
}

impl FaultCategory {
    /// All categories in band order.
    pub const ALL: [FaultCategory; 9] = [
        FaultCategory::Runtime,
        FaultCategory::Compilation,
        FaultCategory::Execution,
        FaultCategory::Memory,
        FaultCategory::Type,
        FaultCategory::Security,
        FaultCategory::Network,
        FaultCategory::Storage,
        FaultCategory::Configuration,
    ];

    /// First code of this category's band.
    pub fn band_start(self) -> u16 {
        match self {
            FaultCategory::Runtime => 1000,
            FaultCategory::Compilation => 2000,
            FaultCategory::Execution => 3000,
            FaultCategory::Memory => 4000,
            FaultCategory::Type => 5000,
            FaultCategory::Security => 6000,
            FaultCategory::Network => 7000,
            FaultCategory::Storage => 8000,
            FaultCategory::Configuration => 9000,
        }
    }

    /// Category owning `raw`, if `raw` falls in a band.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw / 1000 {
            1 => Some(FaultCategory::Runtime),
            2 => Some(FaultCategory::Compilation),
            3 => Some(FaultCategory::Execution),
            4 => Some(FaultCategory::Memory),
            5 => Some(FaultCategory::Type),
            6 => Some(FaultCategory::Security),
            7 => Some(FaultCategory::Network),
            8 => Some(FaultCategory::Storage),
            9 => Some(FaultCategory::Configuration),
            _ => None,
        }
    }

    /// Lowercase name used in logs and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCategory::Runtime => "runtime",
            FaultCategory::Compilation => "compilation",
            FaultCategory::Execution => "execution",
            FaultCategory::Memory => "memory",
            FaultCategory::Type => "type",
            FaultCategory::Security => "security",
            FaultCategory::Network => "network",
            FaultCategory::Storage => "storage",
            FaultCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; execution unaffected
    Low,
    /// Degraded but continuing
    Medium,
    /// Operation failed
    High,
    /// Component integrity at risk
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Lowercase name used in logs and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, tool-addressable fault identifier.
///
/// The thousands digit selects the [`FaultCategory`]; codes outside
/// `1000..=9999` cannot be constructed.
///
/// # Examples
///
/// ```
/// use core_types::{FaultCategory, FaultCode};
///
/// assert_eq!(FaultCode::STACK_UNDERFLOW.category(), FaultCategory::Execution);
/// assert_eq!(FaultCode::new(7042).unwrap().category(), FaultCategory::Network);
/// assert!(FaultCode::new(42).is_none());
/// assert_eq!(FaultCode::STACK_UNDERFLOW.to_string(), "E3001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct FaultCode(u16);

impl FaultCode {
    /// Unclassified engine-internal fault
    pub const INTERNAL: FaultCode = FaultCode(1001);
    /// Interpreter state found inconsistent
    pub const STATE_CORRUPTION: FaultCode = FaultCode(1002);
    /// A host-bridged function reported failure
    pub const HOST_FUNCTION_FAILED: FaultCode = FaultCode(1003);
    /// Component rejected work (circuit open, isolated)
    pub const COMPONENT_UNAVAILABLE: FaultCode = FaultCode(1004);

    /// Region compilation failed as a whole
    pub const JIT_COMPILATION_FAILED: FaultCode = FaultCode(2001);
    /// Bytecode could not be translated to IR
    pub const IR_TRANSLATION_FAILED: FaultCode = FaultCode(2002);
    /// An optimization pass produced a degraded result and was skipped
    pub const OPTIMIZATION_DEGRADED: FaultCode = FaultCode(2003);
    /// Backend lowering failed
    pub const BACKEND_LOWERING_FAILED: FaultCode = FaultCode(2004);
    /// GPU requested but no device context is available
    pub const GPU_UNAVAILABLE: FaultCode = FaultCode(2005);
    /// Region uses a construct the compiler does not handle
    pub const UNSUPPORTED_CONSTRUCT: FaultCode = FaultCode(2006);

    /// Pop below available stack depth
    pub const STACK_UNDERFLOW: FaultCode = FaultCode(3001);
    /// Callee name could not be resolved
    pub const SYMBOL_NOT_FOUND: FaultCode = FaultCode(3002);
    /// Division or remainder by zero
    pub const DIVISION_BY_ZERO: FaultCode = FaultCode(3003);
    /// Checked arithmetic overflowed
    pub const ARITHMETIC_OVERFLOW: FaultCode = FaultCode(3004);
    /// Jump outside the instruction stream
    pub const INVALID_JUMP_TARGET: FaultCode = FaultCode(3005);
    /// Constant index outside the pool
    pub const INVALID_CONSTANT: FaultCode = FaultCode(3006);
    /// Variable read before assignment
    pub const UNDEFINED_NAME: FaultCode = FaultCode(3007);
    /// Declared and supplied argument counts differ
    pub const ARITY_MISMATCH: FaultCode = FaultCode(3008);

    /// Allocation failed or limit exceeded
    pub const OUT_OF_MEMORY: FaultCode = FaultCode(4001);
    /// Heap structures found corrupted
    pub const HEAP_CORRUPTION: FaultCode = FaultCode(4002);
    /// Call depth limit exceeded
    pub const STACK_OVERFLOW: FaultCode = FaultCode(4003);

    /// Operand types incompatible with the operation
    pub const TYPE_MISMATCH: FaultCode = FaultCode(5001);
    /// Value could not cross the foreign-function boundary
    pub const MARSHALLING_FAILED: FaultCode = FaultCode(5002);

    /// Operation denied by policy
    pub const SECURITY_VIOLATION: FaultCode = FaultCode(6001);

    /// Connection could not be established or was lost
    pub const CONNECTION_FAILED: FaultCode = FaultCode(7001);
    /// Operation did not complete in time
    pub const TIMEOUT: FaultCode = FaultCode(7002);

    /// Storage backend unavailable
    pub const STORAGE_UNAVAILABLE: FaultCode = FaultCode(8001);
    /// Query or transaction failed
    pub const QUERY_FAILED: FaultCode = FaultCode(8002);

    /// Configuration value rejected
    pub const INVALID_CONFIGURATION: FaultCode = FaultCode(9001);
    /// Metric used before registration
    pub const METRIC_NOT_REGISTERED: FaultCode = FaultCode(9002);

    /// Create a code from its raw number; `None` outside the bands.
    pub fn new(raw: u16) -> Option<Self> {
        FaultCategory::from_raw(raw).map(|_| FaultCode(raw))
    }

    /// Raw numeric value.
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Category owning this code's band.
    pub fn category(self) -> FaultCategory {
        // Construction guarantees the band is valid.
        FaultCategory::from_raw(self.0).unwrap_or(FaultCategory::Runtime)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl From<FaultCode> for u16 {
    fn from(code: FaultCode) -> Self {
        code.0
    }
}

impl TryFrom<u16> for FaultCode {
    type Error = String;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        FaultCode::new(raw).ok_or_else(|| format!("fault code {} is outside every band", raw))
    }
}

/// Native-level fault raised inside a single operation.
///
/// Nothing outside the fault subsystem should observe one of these without
/// its [`FaultCode`]; call [`RuntimeFault::code`] at the operation boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFault {
    /// Pop below available depth
    #[error("stack underflow: needed {needed} value(s), {available} available")]
    StackUnderflow {
        /// Values the operation needed
        needed: usize,
        /// Values on the stack
        available: usize,
    },
    /// Unresolved callee
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    /// Read of an unassigned variable
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    /// Division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,
    /// Checked arithmetic overflowed
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(String),
    /// Operand types incompatible with the operation
    #[error("type mismatch in '{operation}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation that rejected its operands
        operation: String,
        /// What was acceptable
        expected: String,
        /// What was supplied
        found: String,
    },
    /// Supplied argument count differs from the declaration
    #[error("function '{name}' takes {expected} argument(s), {found} given")]
    ArityMismatch {
        /// Callee
        name: String,
        /// Declared arity
        expected: usize,
        /// Supplied arity
        found: usize,
    },
    /// Constant index outside the pool
    #[error("invalid constant index {0}")]
    InvalidConstant(usize),
    /// Jump outside the instruction stream
    #[error("invalid jump target {0}")]
    InvalidJumpTarget(usize),
    /// Call depth limit exceeded
    #[error("call depth limit of {limit} exceeded")]
    StackOverflow {
        /// Configured limit
        limit: usize,
    },
    /// Allocation failed
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    /// Heap structures corrupted
    #[error("heap corruption: {0}")]
    HeapCorruption(String),
    /// Interpreter state inconsistent
    #[error("irrecoverable state corruption: {0}")]
    StateCorruption(String),
    /// Operation denied by policy
    #[error("security violation: {0}")]
    SecurityViolation(String),
    /// Network connection failure
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// Operation timed out
    #[error("timed out: {0}")]
    Timeout(String),
    /// Storage backend unavailable
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Host-bridged function failed
    #[error("host function '{name}' failed: {message}")]
    HostFailure {
        /// Host function name
        name: String,
        /// Failure reported by the bridge
        message: String,
    },
    /// Value could not be marshalled across the bridge
    #[error("marshalling failed: {0}")]
    Marshalling(String),
    /// Anything else raised inside the engine
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeFault {
    /// Deterministic mapping to the coded taxonomy.
    pub fn code(&self) -> FaultCode {
        match self {
            RuntimeFault::StackUnderflow { .. } => FaultCode::STACK_UNDERFLOW,
            RuntimeFault::SymbolNotFound(_) => FaultCode::SYMBOL_NOT_FOUND,
            RuntimeFault::UndefinedName(_) => FaultCode::UNDEFINED_NAME,
            RuntimeFault::DivisionByZero => FaultCode::DIVISION_BY_ZERO,
            RuntimeFault::ArithmeticOverflow(_) => FaultCode::ARITHMETIC_OVERFLOW,
            RuntimeFault::TypeMismatch { .. } => FaultCode::TYPE_MISMATCH,
            RuntimeFault::ArityMismatch { .. } => FaultCode::ARITY_MISMATCH,
            RuntimeFault::InvalidConstant(_) => FaultCode::INVALID_CONSTANT,
            RuntimeFault::InvalidJumpTarget(_) => FaultCode::INVALID_JUMP_TARGET,
            RuntimeFault::StackOverflow { .. } => FaultCode::STACK_OVERFLOW,
            RuntimeFault::OutOfMemory(_) => FaultCode::OUT_OF_MEMORY,
            RuntimeFault::HeapCorruption(_) => FaultCode::HEAP_CORRUPTION,
            RuntimeFault::StateCorruption(_) => FaultCode::STATE_CORRUPTION,
            RuntimeFault::SecurityViolation(_) => FaultCode::SECURITY_VIOLATION,
            RuntimeFault::ConnectionFailed(_) => FaultCode::CONNECTION_FAILED,
            RuntimeFault::Timeout(_) => FaultCode::TIMEOUT,
            RuntimeFault::StorageUnavailable(_) => FaultCode::STORAGE_UNAVAILABLE,
            RuntimeFault::HostFailure { .. } => FaultCode::HOST_FUNCTION_FAILED,
            RuntimeFault::Marshalling(_) => FaultCode::MARSHALLING_FAILED,
            RuntimeFault::Internal(_) => FaultCode::INTERNAL,
        }
    }

    /// Category of [`RuntimeFault::code`].
    pub fn category(&self) -> FaultCategory {
        self.code().category()
    }
}
