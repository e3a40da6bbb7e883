//! Dead code elimination
//!
//! Removes ops after a terminator up to the next label, jumps to the label
//! that directly follows, labels nothing branches to, and definitions whose
//! registers are never read. Only ops that cannot fault are removed as
//! dead definitions; parameter loads qualify because parameters are always
//! bound.

use super::Pass;
use crate::ir::{IrFunction, IrOp, Label, Reg};
use std::collections::{HashMap, HashSet};

/// Removes unreachable and unused code
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

fn removable(op: &IrOp, arity: usize) -> bool {
    match op {
        IrOp::Const { .. } | IrOp::Not { .. } | IrOp::BuildList { .. } => true,
        IrOp::LoadSlot { slot, .. } => *slot < arity,
        _ => false,
    }
}

fn remove_unreachable(ir: &mut IrFunction) -> usize {
    let before = ir.ops.len();
    let mut reachable = true;
    ir.ops.retain(|op| match op {
        IrOp::Label(_) => {
            reachable = true;
            true
        }
        _ if !reachable => false,
        _ => {
            reachable = !op.is_terminator();
            true
        }
    });
    before - ir.ops.len()
}

fn remove_fallthrough_jumps(ir: &mut IrFunction) -> usize {
    let mut removed = 0;
    let mut i = 0;
    while i + 1 < ir.ops.len() {
        match (&ir.ops[i], &ir.ops[i + 1]) {
            (IrOp::Jump(target), IrOp::Label(next)) if target == next => {
                ir.ops.remove(i);
                removed += 1;
            }
            _ => i += 1,
        }
    }
    removed
}

fn remove_unused_labels(ir: &mut IrFunction) -> usize {
    let targets: HashSet<Label> = ir
        .ops
        .iter()
        .filter_map(|op| match op {
            IrOp::Jump(label) => Some(*label),
            IrOp::Branch { if_false, .. } => Some(*if_false),
            _ => None,
        })
        .collect();
    let before = ir.ops.len();
    ir.ops
        .retain(|op| !matches!(op, IrOp::Label(label) if !targets.contains(label)));
    before - ir.ops.len()
}

fn remove_dead_defs(ir: &mut IrFunction) -> usize {
    let arity = ir.arity;
    let mut removed = 0;
    loop {
        let mut uses: HashMap<Reg, usize> = HashMap::new();
        for reg in ir.ops.iter().flat_map(IrOp::uses) {
            *uses.entry(reg).or_insert(0) += 1;
        }
        let before = ir.ops.len();
        ir.ops.retain(|op| {
            !(removable(op, arity) && op.defs().iter().all(|r| !uses.contains_key(r)))
        });
        let pass_removed = before - ir.ops.len();
        if pass_removed == 0 {
            return removed;
        }
        removed += pass_removed;
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&self, ir: &mut IrFunction) -> usize {
        // Unreachable code first: dropping it can orphan labels and defs.
        let mut removed = remove_unreachable(ir);
        removed += remove_fallthrough_jumps(ir);
        removed += remove_unused_labels(ir);
        removed += remove_unreachable(ir);
        removed + remove_dead_defs(ir)
    }
}
