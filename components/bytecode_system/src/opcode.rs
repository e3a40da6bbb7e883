//! Bytecode opcodes for the stack VM
//!
//! Operands are carried inline: constant indices, absolute jump targets,
//! names, call arity and list length.

use core_types::{BinaryOp, CompareOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytecode opcodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Stack
    /// Push constant at pool index
    LoadConst(usize),
    /// Discard top of stack
    PopTop,
    /// Duplicate top of stack
    Dup,

    // Names
    /// Push the value bound to a name (frame locals, then globals)
    LoadName(String),
    /// Pop and bind to a name in the current scope
    StoreName(String),

    // Arithmetic
    /// `a + b`
    BinaryAdd,
    /// `a - b`
    BinarySub,
    /// `a * b`
    BinaryMul,
    /// `a / b`
    BinaryDiv,
    /// `a % b`
    BinaryMod,
    /// `-a`
    UnaryNeg,
    /// `not a`
    UnaryNot,
    /// Compare the two topmost values, push a bool
    CompareOp(CompareOp),

    // Control flow
    /// Jump to absolute instruction index
    Jump(usize),
    /// Pop; jump to absolute index if the value is falsy
    PopJumpIfFalse(usize),

    // Calls
    /// Call a function by name with `arity` stacked arguments
    CallFunction(String, usize),
    /// Return top of stack (or none) to the caller
    ReturnValue,

    // Collections
    /// Pop `n` values and push them as a list in push order
    BuildList(usize),
}

impl Opcode {
    /// Mnemonic used by the disassembler.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::LoadConst(_) => "LOAD_CONST",
            Opcode::PopTop => "POP_TOP",
            Opcode::Dup => "DUP_TOP",
            Opcode::LoadName(_) => "LOAD_NAME",
            Opcode::StoreName(_) => "STORE_NAME",
            Opcode::BinaryAdd => "BINARY_ADD",
            Opcode::BinarySub => "BINARY_SUBTRACT",
            Opcode::BinaryMul => "BINARY_MULTIPLY",
            Opcode::BinaryDiv => "BINARY_DIVIDE",
            Opcode::BinaryMod => "BINARY_MODULO",
            Opcode::UnaryNeg => "UNARY_NEGATIVE",
            Opcode::UnaryNot => "UNARY_NOT",
            Opcode::CompareOp(_) => "COMPARE_OP",
            Opcode::Jump(_) => "JUMP_ABSOLUTE",
            Opcode::PopJumpIfFalse(_) => "POP_JUMP_IF_FALSE",
            Opcode::CallFunction(..) => "CALL_FUNCTION",
            Opcode::ReturnValue => "RETURN_VALUE",
            Opcode::BuildList(_) => "BUILD_LIST",
        }
    }

    /// Operator for the binary arithmetic opcodes.
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            Opcode::BinaryAdd => Some(BinaryOp::Add),
            Opcode::BinarySub => Some(BinaryOp::Sub),
            Opcode::BinaryMul => Some(BinaryOp::Mul),
            Opcode::BinaryDiv => Some(BinaryOp::Div),
            Opcode::BinaryMod => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    /// Check if this opcode is a binary arithmetic operation
    pub fn is_binary_arithmetic(&self) -> bool {
        self.binary_op().is_some()
    }

    /// Jump target, for the two jump opcodes.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Opcode::Jump(target) | Opcode::PopJumpIfFalse(target) => Some(*target),
            _ => None,
        }
    }

    /// Check if this opcode ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::ReturnValue | Opcode::Jump(_) | Opcode::PopJumpIfFalse(_)
        )
    }

    /// Number of values this opcode pops before pushing.
    pub fn pops(&self) -> usize {
        match self {
            Opcode::LoadConst(_) | Opcode::LoadName(_) | Opcode::Jump(_) => 0,
            Opcode::PopTop
            | Opcode::Dup
            | Opcode::StoreName(_)
            | Opcode::UnaryNeg
            | Opcode::UnaryNot
            | Opcode::PopJumpIfFalse(_) => 1,
            Opcode::BinaryAdd
            | Opcode::BinarySub
            | Opcode::BinaryMul
            | Opcode::BinaryDiv
            | Opcode::BinaryMod
            | Opcode::CompareOp(_) => 2,
            Opcode::CallFunction(_, arity) => *arity,
            Opcode::BuildList(n) => *n,
            // Returning from an empty stack yields none.
            Opcode::ReturnValue => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic();
        match self {
            Opcode::LoadConst(idx) => write!(f, "{:<18} {}", name, idx),
            Opcode::LoadName(n) | Opcode::StoreName(n) => write!(f, "{:<18} {}", name, n),
            Opcode::CompareOp(op) => write!(f, "{:<18} {}", name, op),
            Opcode::Jump(t) | Opcode::PopJumpIfFalse(t) => write!(f, "{:<18} -> {}", name, t),
            Opcode::CallFunction(callee, arity) => {
                write!(f, "{:<18} {} ({} args)", name, callee, arity)
            }
            Opcode::BuildList(n) => write!(f, "{:<18} {}", name, n),
            _ => write!(f, "{}", name),
        }
    }
}
