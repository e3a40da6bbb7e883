//! Virtual machine
//!
//! Main entry point for executing bytecode. A [`VM`] is one call chain; the
//! fault handler, metric registry, JIT and function table it holds are
//! shared with every VM forked from it.

use crate::builtins::register_builtins;
use crate::call_frame::CallChain;
use crate::config::EngineConfig;
use crate::dispatch::{report_compile_failure, Dispatcher, Env};
use crate::functions::{FunctionTable, NativeFunction};
use crate::host::HostBridge;
use crate::stack::ExecutionStack;
use crate::stats::ExecutionStats;
use bytecode_system::{BytecodeChunk, FunctionDescriptor};
use core_types::{RegionId, RuntimeFault, Value};
use fault_handling::{FaultHandler, FaultReport, FaultRequest};
use jit_compiler::JitCompiler;
use parking_lot::RwLock;
use std::sync::Arc;
use telemetry::{names, MetricRegistry};
use tracing::debug;

/// Bytecode virtual machine
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bytecode_system::{BytecodeChunk, Opcode};
/// use core_types::Value;
/// use fault_handling::{FaultConfig, FaultHandler};
/// use interpreter::{EngineConfig, VM};
/// use jit_compiler::{JitCompiler, JitConfig};
/// use telemetry::MetricRegistry;
///
/// let telemetry = Arc::new(MetricRegistry::default());
/// let mut vm = VM::new(
///     EngineConfig::default(),
///     Arc::new(FaultHandler::new(FaultConfig::default())),
///     telemetry.clone(),
///     Arc::new(JitCompiler::new(JitConfig::default(), telemetry)),
/// );
///
/// let mut chunk = BytecodeChunk::new("main");
/// chunk.emit_constant(Value::Int(2));
/// chunk.emit_constant(Value::Int(3));
/// chunk.emit(Opcode::BinaryAdd);
/// chunk.emit_constant(Value::Int(4));
/// chunk.emit(Opcode::BinaryMul);
///
/// assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(20));
/// ```
#[derive(Debug)]
pub struct VM {
    config: EngineConfig,
    faults: Arc<FaultHandler>,
    telemetry: Arc<MetricRegistry>,
    jit: Arc<JitCompiler>,
    functions: Arc<RwLock<FunctionTable>>,
    dispatcher: Dispatcher,
}

impl VM {
    /// Create a VM with its own function table
    pub fn new(
        config: EngineConfig,
        faults: Arc<FaultHandler>,
        telemetry: Arc<MetricRegistry>,
        jit: Arc<JitCompiler>,
    ) -> Self {
        telemetry.register_runtime_metrics();
        let mut table = FunctionTable::new();
        if config.builtins {
            register_builtins(&mut table);
        }
        Self {
            dispatcher: Dispatcher::new(config.stack_capacity),
            config,
            faults,
            telemetry,
            jit,
            functions: Arc::new(RwLock::new(table)),
        }
    }

    /// Independent call chain sharing this VM's registries.
    ///
    /// The fork starts with an empty stack and a copy of the globals.
    pub fn fork(&self) -> Self {
        Self {
            config: self.config.clone(),
            faults: self.faults.clone(),
            telemetry: self.telemetry.clone(),
            jit: self.jit.clone(),
            functions: self.functions.clone(),
            dispatcher: self.dispatcher.fork(self.config.stack_capacity),
        }
    }

    /// Register a user function, returning the region it is profiled under
    pub fn register_function(&self, descriptor: FunctionDescriptor) -> RegionId {
        self.functions.write().register_user(descriptor)
    }

    /// Register or replace a native function; `arity` of `None` is variadic
    pub fn register_native<F>(&self, name: &str, arity: Option<usize>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync + 'static,
    {
        self.functions
            .write()
            .register_native(NativeFunction::new(name, arity, f));
    }

    /// Install the bridge consulted after user and native functions
    pub fn set_host_bridge(&self, bridge: Arc<dyn HostBridge>) {
        self.functions.write().set_host_bridge(bridge);
    }

    /// Region id of a registered user function
    pub fn region_of(&self, name: &str) -> Option<RegionId> {
        self.functions.read().user(name).map(|f| f.region)
    }

    /// Execute a chunk, registering the functions it defines first.
    ///
    /// Returns the value of a top-level `ReturnValue`, else the value left
    /// on top of the stack, else `Value::None`.
    pub fn execute(&mut self, chunk: &BytecodeChunk) -> Result<Value, FaultReport> {
        let telemetry = Arc::clone(&self.telemetry);
        let _timer = telemetry.start_timer(names::VM_EXECUTE_TIME);
        if let Err(fault) = chunk.validate() {
            return Err(self.fail(fault, &chunk.name));
        }
        if !chunk.functions.is_empty() {
            let mut table = self.functions.write();
            for function in &chunk.functions {
                table.register_user(function.clone());
            }
        }

        let started = self.dispatcher.stats();
        self.dispatcher.stack_mut().reset_high_water_mark();
        let outcome = {
            let table = self.functions.read();
            let env = Env {
                config: &self.config,
                functions: &table,
                jit: &self.jit,
                telemetry: &self.telemetry,
                faults: &self.faults,
            };
            self.dispatcher.run(&env, chunk)
        };
        self.flush(started);

        outcome.map_err(|fault| self.fail(fault, &chunk.name))
    }

    /// Call a function by name with host-supplied arguments
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use fault_handling::{FaultConfig, FaultHandler};
    /// # use interpreter::{EngineConfig, VM};
    /// # use jit_compiler::{JitCompiler, JitConfig};
    /// # use telemetry::MetricRegistry;
    /// use core_types::{FaultCode, Value};
    /// # let telemetry = Arc::new(MetricRegistry::default());
    /// # let mut vm = VM::new(
    /// #     EngineConfig::default(),
    /// #     Arc::new(FaultHandler::new(FaultConfig::default())),
    /// #     telemetry.clone(),
    /// #     Arc::new(JitCompiler::new(JitConfig::default(), telemetry)),
    /// # );
    ///
    /// let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
    /// assert_eq!(vm.call_function("len", vec![list]).unwrap(), Value::Int(2));
    ///
    /// let err = vm.call_function("missing", vec![]).unwrap_err();
    /// assert_eq!(err.code(), FaultCode::SYMBOL_NOT_FOUND);
    /// ```
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, FaultReport> {
        let telemetry = Arc::clone(&self.telemetry);
        let _timer = telemetry.start_timer(names::VM_EXECUTE_TIME);
        let started = self.dispatcher.stats();
        self.dispatcher.stack_mut().reset_high_water_mark();
        let outcome = {
            let table = self.functions.read();
            let env = Env {
                config: &self.config,
                functions: &table,
                jit: &self.jit,
                telemetry: &self.telemetry,
                faults: &self.faults,
            };
            self.dispatcher.call_by_name(&env, name, args)
        };
        self.flush(started);

        outcome.map_err(|fault| self.fail(fault, name))
    }

    /// Publish per-run counters and report failures from background compiles
    fn flush(&mut self, started: ExecutionStats) {
        let high_water = self.dispatcher.stack().high_water_mark();
        let stats = self.dispatcher.stats_mut();
        stats.max_stack_depth = stats.max_stack_depth.max(high_water);
        let executed = stats.instructions - started.instructions;

        if let Err(err) = self.telemetry.increment(names::VM_INSTRUCTIONS, executed) {
            debug!(%err, "instruction count not recorded");
        }
        if let Err(err) = self
            .telemetry
            .record_value(names::VM_STACK_DEPTH, high_water as f64, None)
        {
            debug!(%err, "stack depth not recorded");
        }

        for (region, err) in self.jit.drain_background_failures() {
            let name = self
                .functions
                .read()
                .user_by_region(region)
                .map_or_else(|| region.to_string(), |f| f.descriptor.name.clone());
            report_compile_failure(&self.faults, &self.telemetry, &name, region, &err);
        }
    }

    /// Convert a fault leaving an operation into a report
    fn fail(&mut self, fault: RuntimeFault, entry: &str) -> FaultReport {
        let mut trace = vec![format!("<{}>", entry)];
        trace.extend(self.dispatcher.take_fault_trace().into_iter().rev());
        self.dispatcher.stats_mut().faults += 1;
        if let Err(err) = self.telemetry.increment(names::FAULTS_TOTAL, 1) {
            debug!(%err, "fault not counted");
        }
        self.faults.handle_fault(
            FaultRequest::fault(fault)
                .context("entry", entry)
                .trace(trace),
        )
    }

    /// Global binding
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.dispatcher.global(name).cloned()
    }

    /// Bind a global
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.dispatcher.set_global(name, value);
    }

    /// Operand stack of this chain
    pub fn stack(&self) -> &ExecutionStack {
        self.dispatcher.stack()
    }

    /// Discard every value left on the operand stack
    pub fn clear_stack(&mut self) {
        self.dispatcher.stack_mut().clear();
    }

    /// Frames of this chain; empty between calls
    pub fn chain(&self) -> &CallChain {
        self.dispatcher.chain()
    }

    /// Statistics accumulated by this chain
    pub fn stats(&self) -> ExecutionStats {
        self.dispatcher.stats()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared fault handler
    pub fn faults(&self) -> &Arc<FaultHandler> {
        &self.faults
    }

    /// Shared metric registry
    pub fn telemetry(&self) -> &Arc<MetricRegistry> {
        &self.telemetry
    }

    /// Shared JIT compiler
    pub fn jit(&self) -> &Arc<JitCompiler> {
        &self.jit
    }
}
