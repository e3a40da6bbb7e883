//! Tests for Instruction

use bytecode_system::{Instruction, Opcode};

#[test]
fn test_instruction_from_opcode() {
    let inst: Instruction = Opcode::PopTop.into();
    assert_eq!(inst, Instruction::new(Opcode::PopTop));
}

#[test]
fn test_instruction_line_is_optional() {
    let a = Instruction::new(Opcode::ReturnValue);
    let b = Instruction::with_line(Opcode::ReturnValue, 3);
    assert_ne!(a, b);
    assert_eq!(a.opcode, b.opcode);
}

#[test]
fn test_instruction_clone_is_equal() {
    let inst = Instruction::new(Opcode::CallFunction("f".to_string(), 2));
    assert_eq!(inst.clone(), inst);
}
