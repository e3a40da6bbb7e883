//! Dispatch loop
//!
//! [`Dispatcher`] owns the state of one call chain: operand stack, frames,
//! globals and statistics. Everything shared between chains is passed in
//! through [`Env`] for the duration of a run.

use crate::call_frame::{CallChain, StackFrame};
use crate::config::EngineConfig;
use crate::functions::{Callee, FunctionTable, UserFunction};
use crate::host::call_host;
use crate::stack::ExecutionStack;
use crate::stats::ExecutionStats;
use bytecode_system::{BytecodeChunk, Opcode};
use core_types::{ops, RegionId, RuntimeFault, Value};
use fault_handling::{FaultHandler, FaultRequest};
use jit_compiler::{CompileError, Dispatch, JitCompiler};
use std::collections::HashMap;
use telemetry::{names, MetricRegistry};
use tracing::{debug, trace};

/// Shared collaborators borrowed for one run
pub(crate) struct Env<'a> {
    pub config: &'a EngineConfig,
    pub functions: &'a FunctionTable,
    pub jit: &'a JitCompiler,
    pub telemetry: &'a MetricRegistry,
    pub faults: &'a FaultHandler,
}

impl Env<'_> {
    fn count(&self, metric: &str) {
        if let Err(err) = self.telemetry.increment(metric, 1) {
            debug!(metric, %err, "metric not recorded");
        }
    }
}

enum Flow {
    Continue,
    Return,
}

/// Interpreter state of one call chain
#[derive(Debug, Clone)]
pub struct Dispatcher {
    chain: CallChain,
    globals: HashMap<String, Value>,
    stats: ExecutionStats,
    fault_trace: Option<Vec<String>>,
}

impl Dispatcher {
    /// Create a dispatcher with an empty chain
    pub fn new(stack_capacity: usize) -> Self {
        Self {
            chain: CallChain::new(stack_capacity),
            globals: HashMap::new(),
            stats: ExecutionStats::default(),
            fault_trace: None,
        }
    }

    /// Fresh chain starting from a copy of this one's globals
    pub fn fork(&self, stack_capacity: usize) -> Self {
        Self {
            globals: self.globals.clone(),
            ..Self::new(stack_capacity)
        }
    }

    /// Operand stack
    pub fn stack(&self) -> &ExecutionStack {
        &self.chain.stack
    }

    /// Operand stack, mutably
    pub fn stack_mut(&mut self) -> &mut ExecutionStack {
        &mut self.chain.stack
    }

    /// Frame chain
    pub fn chain(&self) -> &CallChain {
        &self.chain
    }

    /// Global binding
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Bind a global
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Accumulated statistics
    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ExecutionStats {
        &mut self.stats
    }

    /// Frame names captured where the last fault was raised
    pub(crate) fn take_fault_trace(&mut self) -> Vec<String> {
        self.fault_trace.take().unwrap_or_default()
    }

    /// Run `chunk` in the current scope until it returns or falls off the end.
    ///
    /// The result is the value returned, else the top of stack if the chunk
    /// left one, else `Value::None`. The stack is restored to its entry depth
    /// on normal exit and left as it was on a fault.
    pub(crate) fn run(&mut self, env: &Env<'_>, chunk: &BytecodeChunk) -> Result<Value, RuntimeFault> {
        let base = self.chain.stack.len();
        let mut ip = 0;
        while let Some(inst) = chunk.instructions.get(ip) {
            if env.config.trace_instructions {
                trace!(chunk = %chunk.name, ip, op = %inst.opcode, depth = self.chain.stack.len(), "dispatch");
            }
            ip += 1;
            self.stats.instructions += 1;
            match self.step(env, chunk, &inst.opcode, &mut ip) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return) => return Ok(self.finish(base)),
                Err(fault) => {
                    if self.fault_trace.is_none() {
                        self.fault_trace = Some(self.chain.trace());
                    }
                    return Err(fault);
                }
            }
        }
        Ok(self.finish(base))
    }

    fn finish(&mut self, base: usize) -> Value {
        let result = if self.chain.stack.len() > base {
            self.chain.stack.pop().unwrap_or(Value::None)
        } else {
            Value::None
        };
        self.chain.stack.truncate(base);
        result
    }

    fn step(
        &mut self,
        env: &Env<'_>,
        chunk: &BytecodeChunk,
        opcode: &Opcode,
        ip: &mut usize,
    ) -> Result<Flow, RuntimeFault> {
        if let Some(op) = opcode.binary_op() {
            let (a, b) = self.chain.stack.pop_pair()?;
            self.chain.stack.push(ops::binary(op, &a, &b)?);
            return Ok(Flow::Continue);
        }

        match opcode {
            Opcode::LoadConst(idx) => {
                let value = chunk.constant(*idx)?.clone();
                self.chain.stack.push(value);
            }
            Opcode::PopTop => {
                self.chain.stack.pop()?;
            }
            Opcode::Dup => {
                let top = self.chain.stack.peek()?.clone();
                self.chain.stack.push(top);
            }
            Opcode::LoadName(name) => {
                let value = self.load_name(name)?;
                self.chain.stack.push(value);
            }
            Opcode::StoreName(name) => {
                let value = self.chain.stack.pop()?;
                self.store_name(name, value);
            }
            Opcode::UnaryNeg => {
                let value = self.chain.stack.pop()?;
                self.chain.stack.push(ops::negate(&value)?);
            }
            Opcode::UnaryNot => {
                let value = self.chain.stack.pop()?;
                self.chain.stack.push(ops::not(&value));
            }
            Opcode::CompareOp(op) => {
                let (a, b) = self.chain.stack.pop_pair()?;
                self.chain.stack.push(ops::compare(*op, &a, &b)?);
            }
            Opcode::Jump(target) => *ip = jump_target(chunk, *target)?,
            Opcode::PopJumpIfFalse(target) => {
                let target = jump_target(chunk, *target)?;
                if !self.chain.stack.pop()?.is_truthy() {
                    *ip = target;
                }
            }
            Opcode::CallFunction(name, arity) => {
                let result = self.call(env, name, *arity, *ip)?;
                self.chain.stack.push(result);
            }
            Opcode::ReturnValue => return Ok(Flow::Return),
            Opcode::BuildList(n) => {
                let items = self.chain.stack.pop_n(*n)?;
                self.chain.stack.push(Value::List(items));
            }
            Opcode::BinaryAdd
            | Opcode::BinarySub
            | Opcode::BinaryMul
            | Opcode::BinaryDiv
            | Opcode::BinaryMod => {
                return Err(RuntimeFault::Internal(format!(
                    "{} has no binary operator",
                    opcode.mnemonic()
                )))
            }
        }
        Ok(Flow::Continue)
    }

    fn load_name(&self, name: &str) -> Result<Value, RuntimeFault> {
        self.chain
            .current()
            .and_then(|frame| frame.local(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| RuntimeFault::UndefinedName(name.to_string()))
    }

    fn store_name(&mut self, name: &str, value: Value) {
        match self.chain.current_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    /// `CallFunction`: resolve and validate before touching the stack
    fn call(
        &mut self,
        env: &Env<'_>,
        name: &str,
        arity: usize,
        return_address: usize,
    ) -> Result<Value, RuntimeFault> {
        let callee = resolve(env, name)?;
        self.chain.stack.require(arity)?;
        check_arity(&callee, name, arity)?;
        let args = self.chain.stack.pop_n(arity)?;
        self.invoke(env, &callee, name, args, return_address)
    }

    /// Call `name` with arguments supplied by the host
    pub(crate) fn call_by_name(
        &mut self,
        env: &Env<'_>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeFault> {
        let callee = resolve(env, name)?;
        check_arity(&callee, name, args.len())?;
        self.invoke(env, &callee, name, args, 0)
    }

    fn invoke(
        &mut self,
        env: &Env<'_>,
        callee: &Callee,
        name: &str,
        args: Vec<Value>,
        return_address: usize,
    ) -> Result<Value, RuntimeFault> {
        match callee {
            Callee::User(function) => self.call_user(env, function, args, return_address),
            Callee::Native(native) => {
                self.stats.native_calls += 1;
                native.call(&args)
            }
            Callee::Host(bridge) => {
                self.stats.host_calls += 1;
                call_host(bridge.as_ref(), name, &args)
            }
        }
    }

    fn call_user(
        &mut self,
        env: &Env<'_>,
        function: &UserFunction,
        args: Vec<Value>,
        return_address: usize,
    ) -> Result<Value, RuntimeFault> {
        let depth = self.chain.depth();
        if depth >= env.config.max_call_depth {
            return Err(RuntimeFault::StackOverflow {
                limit: env.config.max_call_depth,
            });
        }

        let descriptor = &function.descriptor;
        let volume = args.iter().map(Value::data_volume).sum();
        match env.jit.on_call(function.region, descriptor, volume) {
            Dispatch::Compiled(handle) => {
                self.stats.compiled_calls += 1;
                env.count(names::VM_COMPILED_CALLS);
                return handle.invoke(&args);
            }
            Dispatch::CompileFailed(err) => report_compile_failure(
                env.faults,
                env.telemetry,
                &descriptor.name,
                function.region,
                &err,
            ),
            Dispatch::Interpret => {}
        }

        let _timer = env.telemetry.start_timer(names::VM_CALL_TIME);
        self.stats.user_calls += 1;
        let mut frame = StackFrame::new(
            descriptor.name.as_str(),
            &descriptor.params,
            args,
            return_address,
        );
        frame.region = Some(function.region);
        self.chain.push_frame(frame);
        self.stats.max_call_depth = self.stats.max_call_depth.max(depth + 1);

        let result = self.run(env, &descriptor.chunk);
        self.chain.unwind_to(depth);
        result
    }
}

fn resolve(env: &Env<'_>, name: &str) -> Result<Callee, RuntimeFault> {
    env.functions
        .resolve(name)
        .ok_or_else(|| RuntimeFault::SymbolNotFound(name.to_string()))
}

fn check_arity(callee: &Callee, name: &str, found: usize) -> Result<(), RuntimeFault> {
    match callee {
        Callee::User(function) if function.descriptor.arity() != found => {
            Err(RuntimeFault::ArityMismatch {
                name: name.to_string(),
                expected: function.descriptor.arity(),
                found,
            })
        }
        Callee::Native(native) => native.check_arity(found),
        _ => Ok(()),
    }
}

fn jump_target(chunk: &BytecodeChunk, target: usize) -> Result<usize, RuntimeFault> {
    if target > chunk.instructions.len() {
        return Err(RuntimeFault::InvalidJumpTarget(target));
    }
    Ok(target)
}

/// Compile failures never end the call; they are reported and the call
/// interprets.
pub(crate) fn report_compile_failure(
    faults: &FaultHandler,
    telemetry: &MetricRegistry,
    function: &str,
    region: RegionId,
    err: &CompileError,
) {
    let report = faults.handle_fault(
        FaultRequest::code(err.code())
            .message(err.to_string())
            .context("function", function)
            .context("region", region.to_string()),
    );
    if let Err(err) = telemetry.increment(names::FAULTS_TOTAL, 1) {
        debug!(%err, "fault not counted");
    }
    debug!(code = %report.code(), region = %region, "compile failure reported; interpreting");
}
