//! Tests for BytecodeChunk

use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
use core_types::{RuntimeFault, Value};

#[test]
fn test_chunk_creation() {
    let chunk = BytecodeChunk::new("main");
    assert_eq!(chunk.name, "main");
    assert_eq!(chunk.instruction_count(), 0);
    assert_eq!(chunk.constant_count(), 0);
}

#[test]
fn test_emit_returns_index() {
    let mut chunk = BytecodeChunk::new("main");
    assert_eq!(chunk.emit(Opcode::PopTop), 0);
    assert_eq!(chunk.emit_constant(Value::Int(1)), 1);
    assert_eq!(chunk.instructions[1].opcode, Opcode::LoadConst(0));
}

#[test]
fn test_strings_dedup() {
    let mut chunk = BytecodeChunk::new("main");
    let a = chunk.add_constant(Value::from("hi"));
    let b = chunk.add_constant(Value::from("hi"));
    assert_eq!(a, b);
}

#[test]
fn test_constant_lookup() {
    let mut chunk = BytecodeChunk::new("main");
    chunk.add_constant(Value::Int(9));
    assert_eq!(chunk.constant(0), Ok(&Value::Int(9)));
    assert_eq!(chunk.constant(1), Err(RuntimeFault::InvalidConstant(1)));
}

#[test]
fn test_validate_checks_nested_functions() {
    let mut body = BytecodeChunk::new("f");
    body.emit(Opcode::Jump(10));
    let mut chunk = BytecodeChunk::new("main");
    chunk.define_function(FunctionDescriptor::new("f", Vec::<String>::new(), body));
    assert_eq!(chunk.validate(), Err(RuntimeFault::InvalidJumpTarget(10)));
}

#[test]
fn test_jump_to_end_is_valid() {
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit(Opcode::Jump(1));
    assert!(chunk.validate().is_ok());
}

#[test]
fn test_disassemble_lists_constants_and_code() {
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_with_line(Opcode::LoadConst(0), 1);
    chunk.add_constant(Value::Int(42));
    chunk.emit(Opcode::ReturnValue);
    let text = chunk.disassemble();
    assert!(text.contains("== main =="));
    assert!(text.contains("[0] 42 (int)"));
    assert!(text.contains("LOAD_CONST"));
    assert!(text.contains("RETURN_VALUE"));
}
