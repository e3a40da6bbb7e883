//! Metric names shared by the runtime's components

/// Instructions interpreted (counter)
pub const VM_INSTRUCTIONS: &str = "vm.instructions";
/// Faults routed to the fault handler (counter)
pub const FAULTS_TOTAL: &str = "faults.total";
/// Wall-clock time of one `execute` call (timer, ms)
pub const VM_EXECUTE_TIME: &str = "vm.execute_time";
/// Wall-clock time of one user-function call (timer, ms)
pub const VM_CALL_TIME: &str = "vm.call_time";
/// Deepest operand stack seen in one execution (gauge)
pub const VM_STACK_DEPTH: &str = "vm.max_stack_depth";
/// Calls dispatched to compiled regions (counter)
pub const VM_COMPILED_CALLS: &str = "vm.compiled_calls";
/// Successful region compilations (counter)
pub const JIT_COMPILATIONS: &str = "jit.compilations";
/// Time spent compiling one region (timer, ms)
pub const JIT_COMPILE_TIME: &str = "jit.compile_time";
/// Failed region compilations (counter)
pub const JIT_FAILURES: &str = "jit.failures";
/// Resident memory sampled by the collector (gauge, bytes)
pub const PROCESS_MEMORY: &str = "process.memory_bytes";
/// GPU utilization sampled by the collector (gauge, percent)
pub const GPU_UTILIZATION: &str = "gpu.utilization";
