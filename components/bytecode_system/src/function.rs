//! User-defined function descriptors
//!
//! Parameter binding uses the ordered name list recorded here at
//! registration time; nothing is discovered at call time.

use crate::chunk::BytecodeChunk;
use serde::{Deserialize, Serialize};

/// A bytecode function with an explicit parameter list
///
/// # Examples
///
/// ```
/// use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
///
/// let mut body = BytecodeChunk::new("add");
/// body.emit(Opcode::LoadName("a".into()));
/// body.emit(Opcode::LoadName("b".into()));
/// body.emit(Opcode::BinaryAdd);
/// body.emit(Opcode::ReturnValue);
///
/// let add = FunctionDescriptor::new("add", ["a", "b"], body);
/// assert_eq!(add.arity(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Name callers resolve
    pub name: String,
    /// Parameter names in declaration order
    pub params: Vec<String>,
    /// Function body; execution starts at instruction 0
    pub chunk: BytecodeChunk,
}

impl FunctionDescriptor {
    /// Create a descriptor from a name, ordered parameter names and a body
    pub fn new<I, S>(name: impl Into<String>, params: I, chunk: BytecodeChunk) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            chunk,
        }
    }

    /// Declared number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Disassembly headed by the signature
    pub fn disassemble(&self) -> String {
        format!(
            "fn {}({})\n{}",
            self.name,
            self.params.join(", "),
            self.chunk.disassemble()
        )
    }
}
