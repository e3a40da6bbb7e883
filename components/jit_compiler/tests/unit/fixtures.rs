//! Bytecode functions shared by the pipeline tests

use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
use core_types::{CompareOp, Value};

/// `acc = 0; i = 0; while i < n { acc = acc + i; i = i + 1 } return acc`
pub fn sum_below() -> FunctionDescriptor {
    let mut c = BytecodeChunk::new("sum_below");
    let zero = c.add_constant(Value::Int(0));
    let one = c.add_constant(Value::Int(1));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("i".into()));
    let head = c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadName("n".into()));
    c.emit(Opcode::CompareOp(CompareOp::Lt));
    let exit_branch = c.emit(Opcode::PopJumpIfFalse(0));
    c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadConst(one));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("i".into()));
    c.emit(Opcode::Jump(head));
    let exit = c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::ReturnValue);
    c.patch_jump(exit_branch, exit);
    FunctionDescriptor::new("sum_below", ["n"], c)
}

/// `return [k, k] + [a, b] * k`
pub fn scaled_pair() -> FunctionDescriptor {
    let mut c = BytecodeChunk::new("scaled_pair");
    c.emit(Opcode::LoadName("k".into()));
    c.emit(Opcode::LoadName("k".into()));
    c.emit(Opcode::BuildList(2));
    c.emit(Opcode::LoadName("a".into()));
    c.emit(Opcode::LoadName("b".into()));
    c.emit(Opcode::BuildList(2));
    c.emit(Opcode::LoadName("k".into()));
    c.emit(Opcode::BinaryMul);
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("scaled_pair", ["a", "b", "k"], c)
}

/// `return (x + y) * (x + y) - x / y`
pub fn polynomial() -> FunctionDescriptor {
    let mut c = BytecodeChunk::new("polynomial");
    for _ in 0..2 {
        c.emit(Opcode::LoadName("x".into()));
        c.emit(Opcode::LoadName("y".into()));
        c.emit(Opcode::BinaryAdd);
    }
    c.emit(Opcode::BinaryMul);
    c.emit(Opcode::LoadName("x".into()));
    c.emit(Opcode::LoadName("y".into()));
    c.emit(Opcode::BinaryDiv);
    c.emit(Opcode::BinarySub);
    c.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("polynomial", ["x", "y"], c)
}
