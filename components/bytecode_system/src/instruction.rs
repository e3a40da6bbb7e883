//! Bytecode instruction representation

use crate::opcode::Opcode;
use serde::{Deserialize, Serialize};

/// A single bytecode instruction with optional source line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode for this instruction, operand included
    pub opcode: Opcode,
    /// Source line reported by the front end
    pub line: Option<u32>,
}

impl Instruction {
    /// Create a new instruction without a source line
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, line: None }
    }

    /// Create a new instruction tagged with a source line
    pub fn with_line(opcode: Opcode, line: u32) -> Self {
        Self {
            opcode,
            line: Some(line),
        }
    }
}

impl From<Opcode> for Instruction {
    fn from(opcode: Opcode) -> Self {
        Instruction::new(opcode)
    }
}
