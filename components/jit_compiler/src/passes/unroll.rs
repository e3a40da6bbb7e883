//! Loop unrolling
//!
//! A loop here is `head: <body with one exit branch> jump head` followed
//! directly by the exit label. The body is repeated `factor` times inside the
//! loop, each copy keeping its own exit check, so the trip count need not be
//! known. Copies get fresh registers; slots carry state between iterations.

use super::Pass;
use crate::ir::{IrFunction, IrOp, Reg};
use std::collections::HashMap;

/// Repeats small loop bodies
#[derive(Debug, Clone, Copy)]
pub struct LoopUnrolling {
    factor: usize,
    max_body: usize,
}

impl LoopUnrolling {
    /// Unroll by `factor` copies, skipping bodies longer than `max_body` ops
    pub fn new(factor: usize, max_body: usize) -> Self {
        Self { factor, max_body }
    }

    /// `(head_index, jump_index)` of the first unrollable loop at or after `from`
    fn find_loop(&self, ir: &IrFunction, from: usize) -> Option<(usize, usize)> {
        for (jump_at, op) in ir.ops.iter().enumerate().skip(from) {
            let IrOp::Jump(head) = op else { continue };
            let Some(head_at) = ir.ops[..jump_at]
                .iter()
                .rposition(|op| *op == IrOp::Label(*head))
            else {
                continue;
            };
            let body = &ir.ops[head_at + 1..jump_at];
            if body.is_empty() || body.len() > self.max_body {
                continue;
            }
            let mut exits = body.iter().filter_map(|op| match op {
                IrOp::Branch { if_false, .. } => Some(*if_false),
                _ => None,
            });
            let (Some(exit), None) = (exits.next(), exits.next()) else {
                continue;
            };
            let plain = body
                .iter()
                .all(|op| !matches!(op, IrOp::Label(_) | IrOp::Jump(_) | IrOp::Return(_)));
            if plain && ir.ops.get(jump_at + 1) == Some(&IrOp::Label(exit)) {
                return Some((head_at, jump_at));
            }
        }
        None
    }
}

impl Pass for LoopUnrolling {
    fn name(&self) -> &'static str {
        "loop_unrolling"
    }

    fn run(&self, ir: &mut IrFunction) -> usize {
        if self.factor < 2 {
            return 0;
        }
        let mut unrolled = 0;
        let mut from = 0;
        while let Some((head_at, jump_at)) = self.find_loop(ir, from) {
            let body: Vec<IrOp> = ir.ops[head_at + 1..jump_at].to_vec();
            let mut copies = Vec::with_capacity(body.len() * (self.factor - 1));
            for _ in 1..self.factor {
                let mut renamed: HashMap<Reg, Reg> = HashMap::new();
                for op in &body {
                    let mut copy = op.clone();
                    copy.map_uses(|r| renamed.get(&r).copied().unwrap_or(r));
                    copy.map_defs(|r| {
                        let fresh = ir.new_reg();
                        renamed.insert(r, fresh);
                        fresh
                    });
                    copies.push(copy);
                }
            }
            let inserted = copies.len();
            ir.ops.splice(jump_at..jump_at, copies);
            from = jump_at + inserted + 1;
            unrolled += 1;
        }
        unrolled
    }
}
