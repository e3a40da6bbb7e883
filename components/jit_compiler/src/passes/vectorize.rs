//! Vectorization
//!
//! Arithmetic with an operand statically known to be a list is rewritten to
//! an elementwise [`IrOp::Vector`] op. Lists come from `BuildList`, list
//! constants and earlier vector ops.

use super::Pass;
use crate::ir::{IrFunction, IrOp, Reg};
use core_types::Value;
use std::collections::HashSet;

/// Marks list arithmetic as elementwise
#[derive(Debug, Clone, Copy, Default)]
pub struct Vectorization;

impl Pass for Vectorization {
    fn name(&self) -> &'static str {
        "vectorization"
    }

    fn run(&self, ir: &mut IrFunction) -> usize {
        let mut lists: HashSet<Reg> = HashSet::new();
        let mut rewrites = 0;
        for op in &mut ir.ops {
            match op {
                IrOp::BuildList { dst, .. }
                | IrOp::Const {
                    dst,
                    value: Value::List(_),
                }
                | IrOp::Vector { dst, .. } => {
                    lists.insert(*dst);
                }
                IrOp::Binary {
                    dst,
                    op: operator,
                    lhs,
                    rhs,
                } if lists.contains(&*lhs) || lists.contains(&*rhs) => {
                    let vector = IrOp::Vector {
                        dst: *dst,
                        op: *operator,
                        lhs: *lhs,
                        rhs: *rhs,
                    };
                    lists.insert(*dst);
                    *op = vector;
                    rewrites += 1;
                }
                _ => {}
            }
        }
        rewrites
    }
}
