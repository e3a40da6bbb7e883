//! Lowered code and compiled region handles

use crate::backend::{BackendTarget, GpuDevice};
use crate::error::CompileError;
use crate::ir::{IrFunction, IrOp, Kernel, Label, Reg};
use crate::passes::PassReport;
use core_types::{ops, RegionId, RuntimeFault, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lowered instruction: IR ops with labels resolved to indices
#[derive(Debug, Clone, PartialEq)]
enum Inst {
    Op(IrOp),
    Jump(usize),
    Branch { cond: Reg, target: usize },
    Return(Option<Reg>),
}

/// Executable form of one function for one target
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredCode {
    target: BackendTarget,
    name: String,
    arity: usize,
    slots: Vec<String>,
    registers: usize,
    insts: Vec<Inst>,
    kernels: Vec<Kernel>,
}

impl LoweredCode {
    /// Resolve labels and size the register file
    pub fn lower(ir: IrFunction, target: BackendTarget) -> Result<Self, CompileError> {
        let lowering = |reason: String| CompileError::Lowering {
            backend: target,
            reason,
        };

        let mut positions: HashMap<Label, usize> = HashMap::new();
        let mut index = 0;
        for op in &ir.ops {
            if let IrOp::Label(label) = op {
                positions.insert(*label, index);
            } else {
                index += 1;
            }
        }
        let resolve = |label: &Label| {
            positions
                .get(label)
                .copied()
                .ok_or_else(|| lowering(format!("undefined label {}", label)))
        };

        let registers = ir.register_count();
        let mut insts = Vec::with_capacity(index);
        for op in &ir.ops {
            let inst = match op {
                IrOp::Label(_) => continue,
                IrOp::Jump(label) => Inst::Jump(resolve(label)?),
                IrOp::Branch { cond, if_false } => Inst::Branch {
                    cond: *cond,
                    target: resolve(if_false)?,
                },
                IrOp::Return(reg) => Inst::Return(*reg),
                IrOp::Kernel { kernel, .. } if *kernel >= ir.kernels.len() => {
                    return Err(lowering(format!("undefined kernel#{}", kernel)));
                }
                other => Inst::Op(other.clone()),
            };
            if let Some(bad) = op
                .defs()
                .into_iter()
                .chain(op.uses())
                .find(|r| r.0 as usize >= registers)
            {
                return Err(lowering(format!("register {} out of range", bad)));
            }
            insts.push(inst);
        }

        Ok(Self {
            target,
            name: ir.name,
            arity: ir.arity,
            slots: ir.slots,
            registers,
            insts,
            kernels: ir.kernels,
        })
    }

    /// Target the code was lowered for
    pub fn target(&self) -> BackendTarget {
        self.target
    }

    /// Number of lowered instructions
    pub fn instruction_count(&self) -> usize {
        self.insts.len()
    }

    /// Number of outlined kernels
    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    /// Execute with `args` bound to the parameter slots.
    ///
    /// Falling off the end returns none.
    pub fn run(&self, args: &[Value], device: Option<&dyn GpuDevice>) -> Result<Value, RuntimeFault> {
        if args.len() != self.arity {
            return Err(RuntimeFault::ArityMismatch {
                name: self.name.clone(),
                expected: self.arity,
                found: args.len(),
            });
        }
        let mut regs: Vec<Option<Value>> = vec![None; self.registers];
        let mut slots: Vec<Option<Value>> = vec![None; self.slots.len()];
        for (slot, arg) in slots.iter_mut().zip(args) {
            *slot = Some(arg.clone());
        }

        let read = |regs: &[Option<Value>], r: Reg| -> Result<Value, RuntimeFault> {
            regs.get(r.0 as usize)
                .and_then(Option::clone)
                .ok_or_else(|| RuntimeFault::Internal(format!("{} read before write", r)))
        };

        let mut pc = 0;
        while let Some(inst) = self.insts.get(pc) {
            pc += 1;
            let op = match inst {
                Inst::Jump(target) => {
                    pc = *target;
                    continue;
                }
                Inst::Branch { cond, target } => {
                    if !read(&regs, *cond)?.is_truthy() {
                        pc = *target;
                    }
                    continue;
                }
                Inst::Return(reg) => {
                    return match reg {
                        Some(r) => read(&regs, *r),
                        None => Ok(Value::None),
                    };
                }
                Inst::Op(op) => op,
            };

            let (dst, value) = match op {
                IrOp::Const { dst, value } => (*dst, value.clone()),
                IrOp::LoadSlot { dst, slot } => {
                    let value = slots.get(*slot).and_then(Option::clone).ok_or_else(|| {
                        RuntimeFault::UndefinedName(
                            self.slots.get(*slot).cloned().unwrap_or_default(),
                        )
                    })?;
                    (*dst, value)
                }
                IrOp::StoreSlot { slot, src } => {
                    let value = read(&regs, *src)?;
                    if let Some(target) = slots.get_mut(*slot) {
                        *target = Some(value);
                    }
                    continue;
                }
                IrOp::Binary { dst, op, lhs, rhs } | IrOp::Vector { dst, op, lhs, rhs } => {
                    (*dst, ops::binary(*op, &read(&regs, *lhs)?, &read(&regs, *rhs)?)?)
                }
                IrOp::Neg { dst, src } => (*dst, ops::negate(&read(&regs, *src)?)?),
                IrOp::Not { dst, src } => (*dst, ops::not(&read(&regs, *src)?)),
                IrOp::Compare { dst, op, lhs, rhs } => {
                    (*dst, ops::compare(*op, &read(&regs, *lhs)?, &read(&regs, *rhs)?)?)
                }
                IrOp::BuildList { dst, items } => {
                    let items = items
                        .iter()
                        .map(|r| read(&regs, *r))
                        .collect::<Result<Vec<_>, _>>()?;
                    (*dst, Value::List(items))
                }
                IrOp::Kernel {
                    kernel,
                    inputs,
                    outputs,
                } => {
                    let device = device.ok_or_else(|| {
                        RuntimeFault::Internal(format!("{} has kernels but no device", self.name))
                    })?;
                    let values = inputs
                        .iter()
                        .map(|r| read(&regs, *r))
                        .collect::<Result<Vec<_>, _>>()?;
                    let results = device.launch(&self.kernels[*kernel], &values)?;
                    if results.len() != outputs.len() {
                        return Err(RuntimeFault::Internal(format!(
                            "kernel#{} returned {} value(s), expected {}",
                            kernel,
                            results.len(),
                            outputs.len()
                        )));
                    }
                    for (reg, value) in outputs.iter().zip(results) {
                        regs[reg.0 as usize] = Some(value);
                    }
                    continue;
                }
                IrOp::Label(_) | IrOp::Jump(_) | IrOp::Branch { .. } | IrOp::Return(_) => {
                    return Err(RuntimeFault::Internal(
                        "control op left in lowered code".to_string(),
                    ));
                }
            };
            regs[dst.0 as usize] = Some(value);
        }
        Ok(Value::None)
    }
}

/// Invocable handle for a compiled region
///
/// Shared as `Arc<CompiledRegion>`; invoking it takes `&self`, so one handle
/// serves any number of call chains.
pub struct CompiledRegion {
    region: RegionId,
    name: String,
    code: LoweredCode,
    device: Option<Arc<dyn GpuDevice>>,
    passes: Vec<PassReport>,
    compile_time: Duration,
}

impl CompiledRegion {
    /// Bind lowered code to its backend context
    pub fn new(
        region: RegionId,
        code: LoweredCode,
        device: Option<Arc<dyn GpuDevice>>,
        passes: Vec<PassReport>,
        compile_time: Duration,
    ) -> Self {
        Self {
            region,
            name: code.name.clone(),
            code,
            device,
            passes,
            compile_time,
        }
    }

    /// Region this handle was compiled from
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.code.arity
    }

    /// Backend the handle runs on
    pub fn target(&self) -> BackendTarget {
        self.code.target
    }

    /// Lowered code
    pub fn code(&self) -> &LoweredCode {
        &self.code
    }

    /// Rewrites made by each pass
    pub fn passes(&self) -> &[PassReport] {
        &self.passes
    }

    /// Time spent compiling
    pub fn compile_time(&self) -> Duration {
        self.compile_time
    }

    /// Call the region with arguments in declaration order
    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        self.code.run(args, self.device.as_deref())
    }
}

impl fmt::Debug for CompiledRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRegion")
            .field("region", &self.region)
            .field("name", &self.name)
            .field("target", &self.code.target)
            .field("instructions", &self.code.instruction_count())
            .field("kernels", &self.code.kernel_count())
            .finish()
    }
}
