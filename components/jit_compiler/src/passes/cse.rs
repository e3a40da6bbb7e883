//! Common subexpression elimination with constant folding
//!
//! Works per label-delimited segment. Operators are deterministic, so a
//! repeated expression can reuse the first result: if the first evaluation
//! had faulted, execution would not have reached the second. A slot store
//! makes later loads of that slot reuse the stored register.

use super::Pass;
use crate::ir::{IrFunction, IrOp, Reg};
use core_types::{ops, BinaryOp, CompareOp, Value};
use std::collections::HashMap;

/// Reuses repeated expressions and folds constant ones
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonSubexpressionElimination;

#[derive(Debug, PartialEq)]
enum Expr {
    Const(Value),
    Load(usize),
    Binary(BinaryOp, Reg, Reg),
    Vector(BinaryOp, Reg, Reg),
    Neg(Reg),
    Not(Reg),
    Compare(CompareOp, Reg, Reg),
    List(Vec<Reg>),
}

fn expr_of(op: &IrOp) -> Option<(Expr, Reg)> {
    let keyed = match op {
        IrOp::Const { dst, value } => (Expr::Const(value.clone()), *dst),
        IrOp::LoadSlot { dst, slot } => (Expr::Load(*slot), *dst),
        IrOp::Binary { dst, op, lhs, rhs } => (Expr::Binary(*op, *lhs, *rhs), *dst),
        IrOp::Vector { dst, op, lhs, rhs } => (Expr::Vector(*op, *lhs, *rhs), *dst),
        IrOp::Neg { dst, src } => (Expr::Neg(*src), *dst),
        IrOp::Not { dst, src } => (Expr::Not(*src), *dst),
        IrOp::Compare { dst, op, lhs, rhs } => (Expr::Compare(*op, *lhs, *rhs), *dst),
        IrOp::BuildList { dst, items } => (Expr::List(items.clone()), *dst),
        _ => return None,
    };
    Some(keyed)
}

/// Evaluate `op` if all its operands are known constants and it succeeds
fn fold(op: &IrOp, constants: &HashMap<Reg, Value>) -> Option<(Reg, Value)> {
    let get = |r: &Reg| constants.get(r);
    let folded = match op {
        IrOp::Binary { dst, op, lhs, rhs } | IrOp::Vector { dst, op, lhs, rhs } => {
            (*dst, ops::binary(*op, get(lhs)?, get(rhs)?).ok()?)
        }
        IrOp::Neg { dst, src } => (*dst, ops::negate(get(src)?).ok()?),
        IrOp::Not { dst, src } => (*dst, ops::not(get(src)?)),
        IrOp::Compare { dst, op, lhs, rhs } => {
            (*dst, ops::compare(*op, get(lhs)?, get(rhs)?).ok()?)
        }
        _ => return None,
    };
    Some(folded)
}

impl Pass for CommonSubexpressionElimination {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn run(&self, ir: &mut IrFunction) -> usize {
        let mut rewrites = 0;
        let mut canonical: HashMap<Reg, Reg> = HashMap::new();
        let mut constants: HashMap<Reg, Value> = HashMap::new();
        let mut available: Vec<(Expr, Reg)> = Vec::new();
        let mut out = Vec::with_capacity(ir.ops.len());

        for mut op in ir.ops.drain(..) {
            op.map_uses(|r| canonical.get(&r).copied().unwrap_or(r));

            match &op {
                IrOp::Label(_) => available.clear(),
                IrOp::StoreSlot { slot, src } => {
                    available.retain(|(expr, _)| *expr != Expr::Load(*slot));
                    available.push((Expr::Load(*slot), *src));
                }
                _ => {}
            }

            if let Some((dst, value)) = fold(&op, &constants) {
                op = IrOp::Const { dst, value };
                rewrites += 1;
            }
            if let IrOp::Const { dst, value } = &op {
                constants.insert(*dst, value.clone());
            }

            if let Some((expr, dst)) = expr_of(&op) {
                if let Some((_, existing)) = available.iter().find(|(e, _)| *e == expr) {
                    canonical.insert(dst, *existing);
                    rewrites += 1;
                    continue;
                }
                available.push((expr, dst));
            }
            out.push(op);
        }

        ir.ops = out;
        rewrites
    }
}
