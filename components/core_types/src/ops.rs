//! Operator semantics shared by the interpreter and compiled regions.
//!
//! Compiled code must produce exactly what interpretation produces, so both
//! tiers evaluate operators through these functions.

use crate::error::RuntimeFault;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition, string concatenation
    Add,
    /// Subtraction
    Sub,
    /// Multiplication, string repetition
    Mul,
    /// Division
    Div,
    /// Remainder
    Mod,
}

impl BinaryOp {
    /// Mnemonic used in fault messages and disassembly.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Comparison operator carried by `COMPARE_OP`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

fn mismatch(op: &str, a: &Value, b: &Value) -> RuntimeFault {
    RuntimeFault::TypeMismatch {
        operation: op.to_string(),
        expected: "compatible operands".to_string(),
        found: format!("{} and {}", a.type_name(), b.type_name()),
    }
}

/// Evaluate `a <op> b`.
///
/// Integers are overflow-checked, mixed numbers widen to float, lists
/// combine elementwise (equal lengths) or broadcast against a scalar.
///
/// # Examples
///
/// ```
/// use core_types::{ops, BinaryOp, Value};
///
/// assert_eq!(ops::binary(BinaryOp::Mul, &Value::Int(5), &Value::Int(4)).unwrap(), Value::Int(20));
/// assert!(ops::binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
/// ```
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, RuntimeFault> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_binary(op, *x, *y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            // Both sides are numbers here.
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            float_binary(op, x, y)
        }
        (Value::Str(x), Value::Str(y)) if op == BinaryOp::Add => {
            Ok(Value::Str(format!("{}{}", x, y)))
        }
        (Value::Str(s), Value::Int(n)) if op == BinaryOp::Mul => {
            if *n < 0 {
                return Err(mismatch("*", a, b));
            }
            Ok(Value::Str(s.repeat(*n as usize)))
        }
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return Err(RuntimeFault::TypeMismatch {
                    operation: op.symbol().to_string(),
                    expected: "lists of equal length".to_string(),
                    found: format!("lengths {} and {}", xs.len(), ys.len()),
                });
            }
            xs.iter()
                .zip(ys)
                .map(|(x, y)| binary(op, x, y))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        (Value::List(xs), scalar) if scalar.is_number() => xs
            .iter()
            .map(|x| binary(op, x, scalar))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (scalar, Value::List(ys)) if scalar.is_number() => ys
            .iter()
            .map(|y| binary(op, scalar, y))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        _ => Err(mismatch(op.symbol(), a, b)),
    }
}

fn int_binary(op: BinaryOp, x: i64, y: i64) -> Result<Value, RuntimeFault> {
    let overflow = || RuntimeFault::ArithmeticOverflow(format!("{} {} {}", x, op.symbol(), y));
    match op {
        BinaryOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Div => {
            if y == 0 {
                return Err(RuntimeFault::DivisionByZero);
            }
            let rem = x.checked_rem(y).ok_or_else(overflow)?;
            if rem == 0 {
                x.checked_div(y).map(Value::Int).ok_or_else(overflow)
            } else {
                Ok(Value::Float(x as f64 / y as f64))
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(RuntimeFault::DivisionByZero);
            }
            x.checked_rem(y).map(Value::Int).ok_or_else(overflow)
        }
    }
}

fn float_binary(op: BinaryOp, x: f64, y: f64) -> Result<Value, RuntimeFault> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(RuntimeFault::DivisionByZero);
            }
            x / y
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(RuntimeFault::DivisionByZero);
            }
            x % y
        }
    };
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(RuntimeFault::ArithmeticOverflow(format!(
            "{} {} {}",
            x,
            op.symbol(),
            y
        )));
    }
    Ok(Value::Float(result))
}

/// Arithmetic negation.
pub fn negate(value: &Value) -> Result<Value, RuntimeFault> {
    match value {
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| RuntimeFault::ArithmeticOverflow(format!("-({})", n))),
        Value::Float(n) => Ok(Value::Float(-n)),
        Value::List(items) => items
            .iter()
            .map(negate)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Err(RuntimeFault::TypeMismatch {
            operation: "-".to_string(),
            expected: "number or list".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// Logical negation; never faults.
pub fn not(value: &Value) -> Value {
    Value::Bool(!value.is_truthy())
}

/// Structural equality with numeric widening (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Evaluate `a <op> b` to a boolean.
///
/// Ordering is defined for numbers and strings only.
pub fn compare(op: CompareOp, a: &Value, b: &Value) -> Result<Value, RuntimeFault> {
    let result = match op {
        CompareOp::Eq => values_equal(a, b),
        CompareOp::Ne => !values_equal(a, b),
        _ => {
            let ordering = order(a, b).ok_or_else(|| mismatch(&op.to_string(), a, b))?;
            match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Eq | CompareOp::Ne => unreachable!("handled above"),
            }
        }
    };
    Ok(Value::Bool(result))
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}
