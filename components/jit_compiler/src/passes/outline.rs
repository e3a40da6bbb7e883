//! Kernel outlining
//!
//! Each maximal run of consecutive vector ops is moved into a [`Kernel`] and
//! replaced by a single launch. Runs only for the GPU target.

use super::Pass;
use crate::ir::{IrFunction, IrOp, Kernel, Reg};
use std::collections::HashSet;

/// Outlines vector runs into device kernels
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelOutlining;

impl Pass for KernelOutlining {
    fn name(&self) -> &'static str {
        "kernel_outlining"
    }

    fn run(&self, ir: &mut IrFunction) -> usize {
        let mut outlined = 0;
        let mut i = 0;
        while i < ir.ops.len() {
            if !matches!(ir.ops[i], IrOp::Vector { .. }) {
                i += 1;
                continue;
            }
            let start = i;
            while i < ir.ops.len() && matches!(ir.ops[i], IrOp::Vector { .. }) {
                i += 1;
            }
            let body: Vec<IrOp> = ir.ops[start..i].to_vec();

            let defined: HashSet<Reg> = body.iter().flat_map(IrOp::defs).collect();
            let mut inputs: Vec<Reg> = Vec::new();
            for reg in body.iter().flat_map(IrOp::uses) {
                if !defined.contains(&reg) && !inputs.contains(&reg) {
                    inputs.push(reg);
                }
            }
            let read_later: HashSet<Reg> = ir.ops[i..].iter().flat_map(IrOp::uses).collect();
            let outputs: Vec<Reg> = body
                .iter()
                .flat_map(IrOp::defs)
                .filter(|r| read_later.contains(r))
                .collect();

            let kernel = ir.kernels.len();
            ir.kernels.push(Kernel {
                id: kernel,
                inputs: inputs.clone(),
                outputs: outputs.clone(),
                body,
            });
            ir.ops.splice(
                start..i,
                [IrOp::Kernel {
                    kernel,
                    inputs,
                    outputs,
                }],
            );
            i = start + 1;
            outlined += 1;
        }
        outlined
    }
}
