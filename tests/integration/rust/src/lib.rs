//! Integration test suite for the bytecode engine
//!
//! Verifies that components work together correctly across crate
//! boundaries. Shared program builders live here.

use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
use core_types::{CompareOp, Value};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use fault_handling;
    pub use interpreter;
    pub use jit_compiler;
    pub use telemetry;
}

/// `square(x) = x * x`
pub fn square() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("square");
    body.emit(Opcode::LoadName("x".into()));
    body.emit(Opcode::LoadName("x".into()));
    body.emit(Opcode::BinaryMul);
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("square", ["x"], body)
}

/// `scaled_pair(a, b, k) = [k, k] + [a, b] * k`
pub fn scaled_pair() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("scaled_pair");
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::BuildList(2));
    body.emit(Opcode::LoadName("a".into()));
    body.emit(Opcode::LoadName("b".into()));
    body.emit(Opcode::BuildList(2));
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::BinaryMul);
    body.emit(Opcode::BinaryAdd);
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("scaled_pair", ["a", "b", "k"], body)
}

/// Program calling `callee(i)` for `i in 0..n` and returning the sum
pub fn call_loop(callee: &str, n: i64) -> BytecodeChunk {
    let mut c = BytecodeChunk::new("main");
    let zero = c.add_constant(Value::Int(0));
    let one = c.add_constant(Value::Int(1));
    let limit = c.add_constant(Value::Int(n));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("i".into()));
    let head = c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadConst(limit));
    c.emit(Opcode::CompareOp(CompareOp::Lt));
    let exit = c.emit(Opcode::PopJumpIfFalse(0));
    c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::CallFunction(callee.into(), 1));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadConst(one));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("i".into()));
    c.emit(Opcode::Jump(head));
    let end = c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::ReturnValue);
    c.patch_jump(exit, end);
    c
}
