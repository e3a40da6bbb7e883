//! Bytecode execution engine
//!
//! This crate provides the stack VM at the center of the runtime:
//! - [`ExecutionStack`] and [`CallChain`]: operand stack and frame chain of
//!   one logical thread
//! - [`FunctionTable`]: user, native and host-bridged callees resolved in
//!   that order
//! - [`VM`]: the dispatch loop, wired to the fault handler, the metric
//!   registry and the JIT
//! - [`Runtime`]: every subsystem built from one [`RuntimeConfig`]
//!
//! Every fault leaving [`VM::execute`] has been recorded by the shared
//! [`fault_handling::FaultHandler`] and comes back as a
//! [`fault_handling::FaultReport`].
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
//! use core_types::{FaultCode, Value};
//! use interpreter::{Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
//! let mut vm = runtime.vm();
//!
//! let mut body = BytecodeChunk::new("double");
//! body.emit(Opcode::LoadName("x".into()));
//! body.emit(Opcode::Dup);
//! body.emit(Opcode::BinaryAdd);
//! body.emit(Opcode::ReturnValue);
//!
//! let mut main = BytecodeChunk::new("main");
//! main.define_function(FunctionDescriptor::new("double", ["x"], body));
//! main.emit_constant(Value::Int(21));
//! main.emit(Opcode::CallFunction("double".into(), 1));
//! assert_eq!(vm.execute(&main).unwrap(), Value::Int(42));
//!
//! let mut bad = BytecodeChunk::new("bad");
//! bad.emit(Opcode::CallFunction("nowhere".into(), 0));
//! assert_eq!(vm.execute(&bad).unwrap_err().code(), FaultCode::SYMBOL_NOT_FOUND);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod call_frame;
pub mod config;
pub mod dispatch;
pub mod functions;
pub mod host;
pub mod logging;
pub mod runtime;
pub mod stack;
pub mod stats;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::{CallChain, StackFrame};
pub use config::{ConfigError, EngineConfig, RuntimeConfig};
pub use dispatch::Dispatcher;
pub use functions::{Callee, FunctionTable, NativeFn, NativeFunction, UserFunction};
pub use host::{call_host, ForeignValue, HostBridge, HostError, HostFunctions};
pub use logging::init_logging;
pub use runtime::Runtime;
pub use stack::ExecutionStack;
pub use stats::ExecutionStats;
pub use vm::VM;
