//! Native builtins registered with every engine

use crate::functions::{FunctionTable, NativeFunction};
use core_types::{ops, BinaryOp, CompareOp, RuntimeFault, Value};
use tracing::info;

fn type_mismatch(operation: &str, expected: &str, found: &Value) -> RuntimeFault {
    RuntimeFault::TypeMismatch {
        operation: operation.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

fn len(args: &[Value]) -> Result<Value, RuntimeFault> {
    let n = match &args[0] {
        Value::List(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        other => return Err(type_mismatch("len", "list or str", other)),
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| RuntimeFault::ArithmeticOverflow("len".into()))
}

fn abs(args: &[Value]) -> Result<Value, RuntimeFault> {
    match &args[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeFault::ArithmeticOverflow("abs".into())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_mismatch("abs", "number", other)),
    }
}

/// A single list argument is unpacked; otherwise the arguments themselves
fn operands<'a>(name: &str, args: &'a [Value]) -> Result<&'a [Value], RuntimeFault> {
    let values = match args {
        [Value::List(items)] => items.as_slice(),
        _ => args,
    };
    if values.is_empty() {
        return Err(RuntimeFault::ArityMismatch {
            name: name.to_string(),
            expected: 1,
            found: 0,
        });
    }
    Ok(values)
}

fn extreme(name: &str, keep_if: CompareOp, args: &[Value]) -> Result<Value, RuntimeFault> {
    let values = operands(name, args)?;
    let mut best = &values[0];
    for candidate in &values[1..] {
        if ops::compare(keep_if, candidate, best)?.is_truthy() {
            best = candidate;
        }
    }
    Ok(best.clone())
}

fn sum(args: &[Value]) -> Result<Value, RuntimeFault> {
    let Value::List(items) = &args[0] else {
        return Err(type_mismatch("sum", "list", &args[0]));
    };
    items
        .iter()
        .try_fold(Value::Int(0), |acc, item| ops::binary(BinaryOp::Add, &acc, item))
}

fn print(args: &[Value]) -> Result<Value, RuntimeFault> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    info!(target: "interpreter::print", "{}", line);
    Ok(Value::None)
}

/// Register `len`, `abs`, `min`, `max`, `sum` and `print`
pub fn register_builtins(table: &mut FunctionTable) {
    table.register_native(NativeFunction::new("len", Some(1), len));
    table.register_native(NativeFunction::new("abs", Some(1), abs));
    table.register_native(NativeFunction::new("min", None, |args| {
        extreme("min", CompareOp::Lt, args)
    }));
    table.register_native(NativeFunction::new("max", None, |args| {
        extreme("max", CompareOp::Gt, args)
    }));
    table.register_native(NativeFunction::new("sum", Some(1), sum));
    table.register_native(NativeFunction::new("print", None, print));
}
