//! Call frames and the call chain

use crate::stack::ExecutionStack;
use core_types::{RegionId, Value};
use std::collections::HashMap;

/// Activation record of one user-function call
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    /// Function name
    pub name: String,
    /// Parameters and locals by name
    pub locals: HashMap<String, Value>,
    /// Caller instruction to resume after this frame returns
    pub return_address: usize,
    /// Index of the caller frame in the chain; `None` for a call from top level
    pub caller: Option<usize>,
    /// Operand stack depth when the frame was entered
    pub stack_base: usize,
    /// Profiled region of the function
    pub region: Option<RegionId>,
}

impl StackFrame {
    /// Create a frame binding `args` to `params` in order
    pub fn new(
        name: impl Into<String>,
        params: &[String],
        args: Vec<Value>,
        return_address: usize,
    ) -> Self {
        Self {
            name: name.into(),
            locals: params.iter().cloned().zip(args).collect(),
            return_address,
            caller: None,
            stack_base: 0,
            region: None,
        }
    }

    /// Value bound to `name` in this frame
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }
}

/// Operand stack plus frame chain of one logical thread of execution
#[derive(Debug, Clone, Default)]
pub struct CallChain {
    /// Operand stack shared by every frame of the chain
    pub stack: ExecutionStack,
    frames: Vec<StackFrame>,
}

impl CallChain {
    /// Create an empty chain
    pub fn new(stack_capacity: usize) -> Self {
        Self {
            stack: ExecutionStack::with_capacity(stack_capacity),
            frames: Vec::new(),
        }
    }

    /// Push `frame`, linking it to the current top frame
    pub fn push_frame(&mut self, mut frame: StackFrame) -> usize {
        frame.caller = self.frames.len().checked_sub(1);
        frame.stack_base = self.stack.len();
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Pop the top frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Drop frames above `depth`
    pub fn unwind_to(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    /// Innermost frame
    pub fn current(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// Innermost frame, mutably
    pub fn current_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Frame at `index`
    pub fn frame(&self, index: usize) -> Option<&StackFrame> {
        self.frames.get(index)
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frame names from innermost outwards, following caller links
    pub fn trace(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.frames.len());
        let mut at = self.frames.len().checked_sub(1);
        while let Some(index) = at {
            let Some(frame) = self.frames.get(index) else {
                break;
            };
            names.push(frame.name.clone());
            at = frame.caller.filter(|caller| *caller < index);
        }
        names
    }
}
