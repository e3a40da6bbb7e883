//! Bytecode chunk - compiled bytecode container
//!
//! Contains instructions, the constant pool and the functions the chunk
//! defines.

use crate::function::FunctionDescriptor;
use crate::instruction::Instruction;
use crate::opcode::Opcode;
use core_types::{RuntimeFault, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A compiled bytecode chunk containing instructions and constants
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BytecodeChunk {
    /// Name shown in disassembly and traces
    pub name: String,
    /// Sequence of bytecode instructions
    pub instructions: Vec<Instruction>,
    /// Constant pool for literal values
    pub constants: Vec<Value>,
    /// User-defined functions registered when the chunk is executed
    pub functions: Vec<FunctionDescriptor>,
}

impl BytecodeChunk {
    /// Create a new empty bytecode chunk
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Emit an instruction without source line, returning its index
    pub fn emit(&mut self, opcode: Opcode) -> usize {
        self.instructions.push(Instruction::new(opcode));
        self.instructions.len() - 1
    }

    /// Emit an instruction tagged with a source line
    pub fn emit_with_line(&mut self, opcode: Opcode, line: u32) -> usize {
        self.instructions.push(Instruction::with_line(opcode, line));
        self.instructions.len() - 1
    }

    /// Add `value` to the pool and emit `LOAD_CONST` for it
    pub fn emit_constant(&mut self, value: Value) -> usize {
        let idx = self.add_constant(value);
        self.emit(Opcode::LoadConst(idx))
    }

    /// Add a constant to the pool and return its index.
    ///
    /// An equal constant already in the pool is reused.
    pub fn add_constant(&mut self, value: Value) -> usize {
        if let Some(idx) = self.constants.iter().position(|c| *c == value) {
            return idx;
        }
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Rewrite the jump at `at` to target `target`.
    ///
    /// Front ends emit forward jumps before the target is known.
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        if let Some(inst) = self.instructions.get_mut(at) {
            match &mut inst.opcode {
                Opcode::Jump(t) | Opcode::PopJumpIfFalse(t) => *t = target,
                _ => {}
            }
        }
    }

    /// Attach a function definition to this chunk
    pub fn define_function(&mut self, function: FunctionDescriptor) {
        self.functions.push(function);
    }

    /// Get the number of instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Get the number of constants
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Look up a constant, faulting on a bad index
    pub fn constant(&self, idx: usize) -> Result<&Value, RuntimeFault> {
        self.constants
            .get(idx)
            .ok_or(RuntimeFault::InvalidConstant(idx))
    }

    /// Check every operand that refers into the chunk.
    ///
    /// Jump targets may equal the instruction count (falling off the end).
    pub fn validate(&self) -> Result<(), RuntimeFault> {
        let len = self.instructions.len();
        for inst in &self.instructions {
            match &inst.opcode {
                Opcode::LoadConst(idx) if *idx >= self.constants.len() => {
                    return Err(RuntimeFault::InvalidConstant(*idx));
                }
                Opcode::Jump(t) | Opcode::PopJumpIfFalse(t) if *t > len => {
                    return Err(RuntimeFault::InvalidJumpTarget(*t));
                }
                _ => {}
            }
        }
        for function in &self.functions {
            function.chunk.validate()?;
        }
        Ok(())
    }

    /// Render a human-readable listing: constants, then numbered instructions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", self.name);
        if !self.constants.is_empty() {
            let _ = writeln!(out, "constants:");
            for (i, constant) in self.constants.iter().enumerate() {
                let _ = writeln!(out, "  [{}] {} ({})", i, constant, constant.type_name());
            }
        }
        let _ = writeln!(out, "code:");
        for (i, inst) in self.instructions.iter().enumerate() {
            let line = inst
                .line
                .map(|l| format!("{:>4}", l))
                .unwrap_or_else(|| "   -".to_string());
            let _ = write!(out, "{} {:>4}  {}", line, i, inst.opcode);
            if let Opcode::LoadConst(idx) = inst.opcode {
                if let Some(constant) = self.constants.get(idx) {
                    let _ = write!(out, " ({})", constant);
                }
            }
            out.push('\n');
        }
        for function in &self.functions {
            out.push('\n');
            out.push_str(&function.disassemble());
        }
        out
    }
}
