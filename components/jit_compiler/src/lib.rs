//! Hot-path profiling and JIT compilation for the bytecode engine
//!
//! This crate provides:
//! - [`HotPathProfiler`]: per-region counters driving the promotion state machine
//! - [`ir`]: register IR translated from stack bytecode
//! - [`passes`]: loop unrolling, vectorization, CSE, DCE and GPU kernel outlining
//! - [`backend`]: CPU and GPU lowering with `Auto` selection by data volume
//! - [`JitCompiler`]: the pipeline, its statistics and the background policy
//!
//! Compiled regions evaluate operators through `core_types::ops`, the same
//! functions the interpreter uses, so switching tiers never changes a result.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
//! use core_types::{RegionId, Value};
//! use jit_compiler::{BackendTarget, JitCompiler, JitConfig};
//! use telemetry::MetricRegistry;
//!
//! let mut body = BytecodeChunk::new("add");
//! body.emit(Opcode::LoadName("a".into()));
//! body.emit(Opcode::LoadName("b".into()));
//! body.emit(Opcode::BinaryAdd);
//! body.emit(Opcode::ReturnValue);
//! let add = FunctionDescriptor::new("add", ["a", "b"], body);
//!
//! let jit = JitCompiler::new(JitConfig::default(), Arc::new(MetricRegistry::default()));
//! let compiled = jit.compile(RegionId(1), &add, 2).unwrap();
//! assert_eq!(compiled.target(), BackendTarget::Cpu);
//! assert_eq!(compiled.invoke(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod compiled;
pub mod compiler;
pub mod config;
pub mod error;
pub mod ir;
pub mod passes;
pub mod profiler;

// Re-export main types at crate root
pub use backend::{BackendTarget, GpuDevice, SimulatedGpu};
pub use compiled::{CompiledRegion, LoweredCode};
pub use compiler::{CompilerStats, Dispatch, JitCompiler};
pub use config::{BackendMode, CompilePolicy, JitConfig};
pub use error::CompileError;
pub use profiler::{HotPathProfiler, HotRegion, ProfileDecision, RegionProfile};
