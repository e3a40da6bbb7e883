//! Intermediate representation for JIT compilation
//!
//! Bytecode is stack based; the IR names every intermediate in a virtual
//! register and every function-local name in a slot, which is what the
//! optimization passes operate on.
//!
//! Registers are written once. Values cross control flow only through
//! slots: translation requires the operand stack to be empty at every jump
//! and jump target, so a register is only ever used inside the label-delimited
//! segment that defines it.

use crate::error::CompileError;
use bytecode_system::{FunctionDescriptor, Opcode};
use core_types::{BinaryOp, CompareOp, Value};
use std::collections::HashSet;
use std::fmt;

/// Virtual register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Branch target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// IR operation
#[derive(Debug, Clone, PartialEq)]
pub enum IrOp {
    /// `dst = value`
    Const {
        /// Destination
        dst: Reg,
        /// Constant
        value: Value,
    },
    /// `dst = slots[slot]`
    LoadSlot {
        /// Destination
        dst: Reg,
        /// Slot index
        slot: usize,
    },
    /// `slots[slot] = src`
    StoreSlot {
        /// Slot index
        slot: usize,
        /// Source
        src: Reg,
    },
    /// `dst = lhs op rhs`
    Binary {
        /// Destination
        dst: Reg,
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
    },
    /// Elementwise `dst = lhs op rhs` where an operand is known to be a list
    Vector {
        /// Destination
        dst: Reg,
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
    },
    /// `dst = -src`
    Neg {
        /// Destination
        dst: Reg,
        /// Operand
        src: Reg,
    },
    /// `dst = not src`
    Not {
        /// Destination
        dst: Reg,
        /// Operand
        src: Reg,
    },
    /// `dst = lhs cmp rhs`
    Compare {
        /// Destination
        dst: Reg,
        /// Comparison
        op: CompareOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
    },
    /// `dst = [items...]`
    BuildList {
        /// Destination
        dst: Reg,
        /// Elements in order
        items: Vec<Reg>,
    },
    /// Launch an outlined kernel
    Kernel {
        /// Index into [`IrFunction::kernels`]
        kernel: usize,
        /// Registers read by the kernel, in kernel input order
        inputs: Vec<Reg>,
        /// Registers written by the kernel, in kernel output order
        outputs: Vec<Reg>,
    },
    /// Branch target
    Label(Label),
    /// Unconditional jump
    Jump(Label),
    /// Jump when `cond` is falsy
    Branch {
        /// Condition
        cond: Reg,
        /// Target when falsy
        if_false: Label,
    },
    /// Return a value (or none)
    Return(Option<Reg>),
}

impl IrOp {
    /// Registers written by this op
    pub fn defs(&self) -> Vec<Reg> {
        match self {
            IrOp::Const { dst, .. }
            | IrOp::LoadSlot { dst, .. }
            | IrOp::Binary { dst, .. }
            | IrOp::Vector { dst, .. }
            | IrOp::Neg { dst, .. }
            | IrOp::Not { dst, .. }
            | IrOp::Compare { dst, .. }
            | IrOp::BuildList { dst, .. } => vec![*dst],
            IrOp::Kernel { outputs, .. } => outputs.clone(),
            _ => Vec::new(),
        }
    }

    /// Registers read by this op
    pub fn uses(&self) -> Vec<Reg> {
        match self {
            IrOp::StoreSlot { src, .. } | IrOp::Neg { src, .. } | IrOp::Not { src, .. } => {
                vec![*src]
            }
            IrOp::Binary { lhs, rhs, .. }
            | IrOp::Vector { lhs, rhs, .. }
            | IrOp::Compare { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrOp::BuildList { items, .. } => items.clone(),
            IrOp::Kernel { inputs, .. } => inputs.clone(),
            IrOp::Branch { cond, .. } => vec![*cond],
            IrOp::Return(Some(reg)) => vec![*reg],
            _ => Vec::new(),
        }
    }

    /// Rewrite every register read by this op
    pub fn map_uses(&mut self, mut f: impl FnMut(Reg) -> Reg) {
        match self {
            IrOp::StoreSlot { src, .. } | IrOp::Neg { src, .. } | IrOp::Not { src, .. } => {
                *src = f(*src)
            }
            IrOp::Binary { lhs, rhs, .. }
            | IrOp::Vector { lhs, rhs, .. }
            | IrOp::Compare { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            IrOp::BuildList { items, .. } => items.iter_mut().for_each(|r| *r = f(*r)),
            IrOp::Kernel { inputs, .. } => inputs.iter_mut().for_each(|r| *r = f(*r)),
            IrOp::Branch { cond, .. } => *cond = f(*cond),
            IrOp::Return(Some(reg)) => *reg = f(*reg),
            _ => {}
        }
    }

    /// Rewrite every register written by this op
    pub fn map_defs(&mut self, mut f: impl FnMut(Reg) -> Reg) {
        match self {
            IrOp::Const { dst, .. }
            | IrOp::LoadSlot { dst, .. }
            | IrOp::Binary { dst, .. }
            | IrOp::Vector { dst, .. }
            | IrOp::Neg { dst, .. }
            | IrOp::Not { dst, .. }
            | IrOp::Compare { dst, .. }
            | IrOp::BuildList { dst, .. } => *dst = f(*dst),
            IrOp::Kernel { outputs, .. } => outputs.iter_mut().for_each(|r| *r = f(*r)),
            _ => {}
        }
    }

    /// Whether control never falls through to the next op
    pub fn is_terminator(&self) -> bool {
        matches!(self, IrOp::Jump(_) | IrOp::Return(_))
    }
}

impl fmt::Display for IrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrOp::Const { dst, value } => write!(f, "{} = const {}", dst, value),
            IrOp::LoadSlot { dst, slot } => write!(f, "{} = slot[{}]", dst, slot),
            IrOp::StoreSlot { slot, src } => write!(f, "slot[{}] = {}", slot, src),
            IrOp::Binary { dst, op, lhs, rhs } => {
                write!(f, "{} = {} {} {}", dst, lhs, op.symbol(), rhs)
            }
            IrOp::Vector { dst, op, lhs, rhs } => {
                write!(f, "{} = vec {} {} {}", dst, lhs, op.symbol(), rhs)
            }
            IrOp::Neg { dst, src } => write!(f, "{} = -{}", dst, src),
            IrOp::Not { dst, src } => write!(f, "{} = not {}", dst, src),
            IrOp::Compare { dst, op, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op, rhs),
            IrOp::BuildList { dst, items } => write!(f, "{} = list({})", dst, join(items)),
            IrOp::Kernel {
                kernel,
                inputs,
                outputs,
            } => write!(f, "({}) = kernel#{}({})", join(outputs), kernel, join(inputs)),
            IrOp::Label(label) => write!(f, "{}:", label),
            IrOp::Jump(label) => write!(f, "jump {}", label),
            IrOp::Branch { cond, if_false } => write!(f, "branch_false {} {}", cond, if_false),
            IrOp::Return(Some(reg)) => write!(f, "return {}", reg),
            IrOp::Return(None) => write!(f, "return"),
        }
    }
}

fn join(regs: &[Reg]) -> String {
    regs.iter()
        .map(Reg::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A straight-line run of vector ops outlined for a device
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    /// Kernel index within its function
    pub id: usize,
    /// Registers the body reads but does not define
    pub inputs: Vec<Reg>,
    /// Registers the body defines that are read afterwards
    pub outputs: Vec<Reg>,
    /// `Vector` ops in execution order
    pub body: Vec<IrOp>,
}

/// IR for one function
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    /// Source function name
    pub name: String,
    /// Number of parameters; they occupy the first slots
    pub arity: usize,
    /// Slot names, parameters first
    pub slots: Vec<String>,
    /// Operations
    pub ops: Vec<IrOp>,
    /// Outlined kernels
    pub kernels: Vec<Kernel>,
    next_reg: u32,
    next_label: u32,
}

impl IrFunction {
    /// Create an empty IR function with the given parameters
    pub fn new(name: impl Into<String>, params: &[String]) -> Self {
        Self {
            name: name.into(),
            arity: params.len(),
            slots: params.to_vec(),
            ops: Vec::new(),
            kernels: Vec::new(),
            next_reg: 0,
            next_label: 0,
        }
    }

    /// Allocate a fresh register
    pub fn new_reg(&mut self) -> Reg {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// Allocate a fresh label
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Registers allocated so far; an upper bound on register indices
    pub fn register_count(&self) -> usize {
        self.next_reg as usize
    }

    /// Append an op
    pub fn emit(&mut self, op: IrOp) {
        self.ops.push(op);
    }

    /// Number of ops
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Slot index of a name
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s == name)
    }

    /// Translate a function body.
    ///
    /// Calls are rejected as unsupported constructs, and so is any read of a
    /// name that is not a parameter and is not assigned on every path
    /// reaching the read. The interpreter resolves such a read against
    /// globals, which compiled code cannot see.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
    /// use jit_compiler::ir::IrFunction;
    ///
    /// let mut body = BytecodeChunk::new("double");
    /// body.emit(Opcode::LoadName("x".into()));
    /// body.emit(Opcode::LoadName("x".into()));
    /// body.emit(Opcode::BinaryAdd);
    /// body.emit(Opcode::ReturnValue);
    ///
    /// let ir = IrFunction::translate(&FunctionDescriptor::new("double", ["x"], body)).unwrap();
    /// assert_eq!(ir.slots, vec!["x".to_string()]);
    /// ```
    pub fn translate(function: &FunctionDescriptor) -> Result<Self, CompileError> {
        Translator::new(function).run()
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {}({}) slots={:?}", self.name, self.arity, self.slots)?;
        for op in &self.ops {
            match op {
                IrOp::Label(_) => writeln!(f, "{}", op)?,
                _ => writeln!(f, "    {}", op)?,
            }
        }
        Ok(())
    }
}

struct Translator<'a> {
    function: &'a FunctionDescriptor,
    ir: IrFunction,
    stack: Vec<Reg>,
    /// Per instruction, the local slots assigned on every path reaching it
    assigned: Vec<Vec<bool>>,
}

impl<'a> Translator<'a> {
    fn new(function: &'a FunctionDescriptor) -> Self {
        let mut ir = IrFunction::new(function.name.clone(), &function.params);
        for instruction in &function.chunk.instructions {
            if let Opcode::StoreName(name) = &instruction.opcode {
                if ir.slot_of(name).is_none() {
                    ir.slots.push(name.clone());
                }
            }
        }
        let assigned = definitely_assigned(function, &ir.slots);
        Self {
            function,
            ir,
            stack: Vec::new(),
            assigned,
        }
    }

    fn fail(&self, reason: impl Into<String>) -> CompileError {
        CompileError::Translation {
            function: self.function.name.clone(),
            reason: reason.into(),
        }
    }

    fn unsupported(&self, construct: String) -> CompileError {
        CompileError::UnsupportedConstruct {
            function: self.function.name.clone(),
            construct,
        }
    }

    fn pop(&mut self, at: usize) -> Result<Reg, CompileError> {
        self.stack
            .pop()
            .ok_or_else(|| self.fail(format!("operand stack underflow at instruction {}", at)))
    }

    fn require_empty_stack(&self, at: usize) -> Result<(), CompileError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(self.fail(format!(
                "{} value(s) live across the block boundary at instruction {}",
                self.stack.len(),
                at
            )))
        }
    }

    fn push_def(&mut self, make: impl FnOnce(Reg) -> IrOp) {
        let dst = self.ir.new_reg();
        self.ir.emit(make(dst));
        self.stack.push(dst);
    }

    fn run(mut self) -> Result<IrFunction, CompileError> {
        let function = self.function;
        let chunk = &function.chunk;
        chunk.validate().map_err(|fault| self.fail(fault.to_string()))?;

        // Bytecode jump targets become labels numbered by instruction index.
        let targets: HashSet<usize> = chunk
            .instructions
            .iter()
            .filter_map(|i| i.opcode.jump_target())
            .collect();
        let label_for = |target: usize| Label(target as u32);
        self.ir.next_label = chunk.instructions.len() as u32 + 1;

        let mut reachable = true;
        for (at, instruction) in chunk.instructions.iter().enumerate() {
            if targets.contains(&at) {
                if reachable {
                    self.require_empty_stack(at)?;
                }
                self.stack.clear();
                self.ir.emit(IrOp::Label(label_for(at)));
                reachable = true;
            }
            if !reachable {
                continue;
            }

            match &instruction.opcode {
                Opcode::LoadConst(idx) => {
                    let value = chunk
                        .constant(*idx)
                        .map_err(|fault| self.fail(fault.to_string()))?
                        .clone();
                    self.push_def(|dst| IrOp::Const { dst, value });
                }
                Opcode::PopTop => {
                    self.pop(at)?;
                }
                Opcode::Dup => {
                    let top = *self
                        .stack
                        .last()
                        .ok_or_else(|| self.fail(format!("operand stack underflow at instruction {}", at)))?;
                    self.stack.push(top);
                }
                Opcode::LoadName(name) => {
                    let slot = self
                        .ir
                        .slot_of(name)
                        .ok_or_else(|| self.unsupported(format!("global name '{}'", name)))?;
                    let local = slot >= self.ir.arity;
                    if local && !self.assigned[at][slot] {
                        return Err(self.unsupported(format!(
                            "read of '{}' before it is assigned on every path",
                            name
                        )));
                    }
                    self.push_def(|dst| IrOp::LoadSlot { dst, slot });
                }
                Opcode::StoreName(name) => {
                    let src = self.pop(at)?;
                    let slot = self
                        .ir
                        .slot_of(name)
                        .ok_or_else(|| self.fail(format!("no slot for '{}'", name)))?;
                    self.ir.emit(IrOp::StoreSlot { slot, src });
                }
                Opcode::BinaryAdd
                | Opcode::BinarySub
                | Opcode::BinaryMul
                | Opcode::BinaryDiv
                | Opcode::BinaryMod => {
                    let rhs = self.pop(at)?;
                    let lhs = self.pop(at)?;
                    let op = instruction
                        .opcode
                        .binary_op()
                        .ok_or_else(|| self.fail("binary opcode without operator"))?;
                    self.push_def(|dst| IrOp::Binary { dst, op, lhs, rhs });
                }
                Opcode::UnaryNeg => {
                    let src = self.pop(at)?;
                    self.push_def(|dst| IrOp::Neg { dst, src });
                }
                Opcode::UnaryNot => {
                    let src = self.pop(at)?;
                    self.push_def(|dst| IrOp::Not { dst, src });
                }
                Opcode::CompareOp(op) => {
                    let rhs = self.pop(at)?;
                    let lhs = self.pop(at)?;
                    let op = *op;
                    self.push_def(|dst| IrOp::Compare { dst, op, lhs, rhs });
                }
                Opcode::Jump(target) => {
                    self.require_empty_stack(at)?;
                    self.ir.emit(IrOp::Jump(label_for(*target)));
                    reachable = false;
                }
                Opcode::PopJumpIfFalse(target) => {
                    let cond = self.pop(at)?;
                    self.require_empty_stack(at)?;
                    self.ir.emit(IrOp::Branch {
                        cond,
                        if_false: label_for(*target),
                    });
                }
                Opcode::CallFunction(name, _) => {
                    return Err(self.unsupported(format!("call to '{}'", name)));
                }
                Opcode::ReturnValue => {
                    let value = self.stack.pop();
                    self.ir.emit(IrOp::Return(value));
                    self.stack.clear();
                    reachable = false;
                }
                Opcode::BuildList(n) => {
                    if self.stack.len() < *n {
                        return Err(self.fail(format!(
                            "operand stack underflow at instruction {}",
                            at
                        )));
                    }
                    let items = self.stack.split_off(self.stack.len() - n);
                    self.push_def(|dst| IrOp::BuildList { dst, items });
                }
            }
        }

        // Falling off the end returns the top of the operand stack, if any.
        let end = chunk.instructions.len();
        if targets.contains(&end) {
            if reachable {
                self.require_empty_stack(end)?;
            }
            self.stack.clear();
            self.ir.emit(IrOp::Label(label_for(end)));
            reachable = true;
        }
        if reachable {
            let value = self.stack.last().copied();
            self.ir.emit(IrOp::Return(value));
        }
        Ok(self.ir)
    }
}

/// Forward must-assign analysis over the bytecode control flow.
///
/// Parameters are always assigned. Instructions no path reaches keep the
/// full set, which is harmless since they never run.
fn definitely_assigned(function: &FunctionDescriptor, slots: &[String]) -> Vec<Vec<bool>> {
    let instructions = &function.chunk.instructions;
    let len = instructions.len();
    let arity = function.params.len();
    let mut entry_state = vec![false; slots.len()];
    entry_state[..arity].iter_mut().for_each(|s| *s = true);

    // `None` means not yet reached.
    let mut states: Vec<Option<Vec<bool>>> = vec![None; len];
    if len == 0 {
        return Vec::new();
    }
    states[0] = Some(entry_state);
    let mut worklist = vec![0usize];

    while let Some(at) = worklist.pop() {
        let Some(mut out) = states[at].clone() else {
            continue;
        };
        let opcode = &instructions[at].opcode;
        if let Opcode::StoreName(name) = opcode {
            if let Some(slot) = slots.iter().position(|s| s == name) {
                out[slot] = true;
            }
        }

        let mut successors = Vec::with_capacity(2);
        match opcode {
            Opcode::ReturnValue => {}
            Opcode::Jump(target) => successors.push(*target),
            Opcode::PopJumpIfFalse(target) => {
                successors.push(at + 1);
                successors.push(*target);
            }
            _ => successors.push(at + 1),
        }

        for next in successors.into_iter().filter(|&n| n < len) {
            let changed = match &mut states[next] {
                Some(state) => {
                    let mut changed = false;
                    for (have, incoming) in state.iter_mut().zip(&out) {
                        if *have && !*incoming {
                            *have = false;
                            changed = true;
                        }
                    }
                    changed
                }
                slot @ None => {
                    *slot = Some(out.clone());
                    true
                }
            };
            if changed {
                worklist.push(next);
            }
        }
    }

    states
        .into_iter()
        .map(|state| state.unwrap_or_else(|| vec![true; slots.len()]))
        .collect()
}
