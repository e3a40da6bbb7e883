//! Bytecode instruction set for the stack VM
//!
//! This crate provides the opcode set, instructions, chunks and function
//! descriptors consumed by the interpreter and translated by the JIT.
//!
//! # Features
//!
//! - Stack-based opcode set with named locals
//! - Deduplicated constant pool
//! - Function descriptors with explicit, ordered parameter names
//! - Structural validation and a human-readable disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode};
//! use core_types::Value;
//!
//! let mut chunk = BytecodeChunk::new("main");
//!
//! // (2 + 3) * 4
//! chunk.emit_constant(Value::Int(2));
//! chunk.emit_constant(Value::Int(3));
//! chunk.emit(Opcode::BinaryAdd);
//! chunk.emit_constant(Value::Int(4));
//! chunk.emit(Opcode::BinaryMul);
//!
//! assert!(chunk.validate().is_ok());
//! assert!(chunk.disassemble().contains("BINARY_MUL"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod function;
pub mod instruction;
pub mod opcode;

// Re-export main types at crate root
pub use chunk::BytecodeChunk;
pub use function::FunctionDescriptor;
pub use instruction::Instruction;
pub use opcode::Opcode;
