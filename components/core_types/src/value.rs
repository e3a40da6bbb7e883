//! Runtime value representation.
//!
//! Every operand on the execution stack, every local and every constant is a
//! [`Value`]. Values are plain data: cloning a list clones its elements, so a
//! value can move freely between call chains on different threads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents any runtime value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let none = Value::None;
/// let number = Value::Int(42);
/// let list = Value::List(vec![Value::Int(1), Value::Float(2.5)]);
///
/// assert!(!none.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(list.type_name(), "list");
/// assert_eq!(list.data_volume(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer; arithmetic on it is overflow-checked
    Int(i64),
    /// IEEE 754 double-precision float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Ordered list of values
    List(Vec<Value>),
}

impl Value {
    /// Returns whether this value counts as true in a conditional jump.
    ///
    /// `None`, `false`, `0`, `0.0`, NaN, the empty string and the empty list
    /// are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => !n.is_nan() && *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Short type name used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    /// Returns true for `Int` and `Float`.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view of the value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view of the value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Number of scalar elements carried by this value.
    ///
    /// Scalars count as one, lists count their elements recursively. The JIT
    /// uses this as the data-volume input of backend selection.
    pub fn data_volume(&self) -> usize {
        match self {
            Value::List(items) => items.iter().map(Value::data_volume).sum(),
            _ => 1,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
