//! Per-engine execution statistics

use serde::Serialize;

/// Counters accumulated by one engine across `execute` calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    /// Instructions interpreted
    pub instructions: u64,
    /// Deepest operand stack observed
    pub max_stack_depth: usize,
    /// Deepest frame chain observed
    pub max_call_depth: usize,
    /// Interpreted user-function calls
    pub user_calls: u64,
    /// Calls dispatched to compiled regions
    pub compiled_calls: u64,
    /// Native builtin calls
    pub native_calls: u64,
    /// Host-bridged calls
    pub host_calls: u64,
    /// Faults that ended an operation
    pub faults: u64,
}

impl ExecutionStats {
    /// Every call regardless of callee kind
    pub fn total_calls(&self) -> u64 {
        self.user_calls + self.compiled_calls + self.native_calls + self.host_calls
    }

    /// Fold `other` into `self`
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.instructions += other.instructions;
        self.max_stack_depth = self.max_stack_depth.max(other.max_stack_depth);
        self.max_call_depth = self.max_call_depth.max(other.max_call_depth);
        self.user_calls += other.user_calls;
        self.compiled_calls += other.compiled_calls;
        self.native_calls += other.native_calls;
        self.host_calls += other.host_calls;
        self.faults += other.faults;
    }
}
