//! Host-bridged functions
//!
//! Callees the engine does not own are reached through a [`HostBridge`].
//! Arguments cross the bridge as [`ForeignValue`]s and results are
//! marshalled back; a foreign value with no engine counterpart is a
//! `MARSHALLING_FAILED` fault.

use core_types::{RuntimeFault, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Value representation on the host side of the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignValue {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Ordered sequence
    Array(Vec<ForeignValue>),
    /// Host object the engine cannot represent
    Opaque(String),
}

impl From<&Value> for ForeignValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::None => ForeignValue::Null,
            Value::Bool(b) => ForeignValue::Bool(*b),
            Value::Int(i) => ForeignValue::Int(*i),
            Value::Float(f) => ForeignValue::Float(*f),
            Value::Str(s) => ForeignValue::Text(s.clone()),
            Value::List(items) => ForeignValue::Array(items.iter().map(Into::into).collect()),
        }
    }
}

impl TryFrom<ForeignValue> for Value {
    type Error = RuntimeFault;

    fn try_from(value: ForeignValue) -> Result<Self, Self::Error> {
        Ok(match value {
            ForeignValue::Null => Value::None,
            ForeignValue::Bool(b) => Value::Bool(b),
            ForeignValue::Int(i) => Value::Int(i),
            ForeignValue::Float(f) => Value::Float(f),
            ForeignValue::Text(s) => Value::Str(s),
            ForeignValue::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            ForeignValue::Opaque(kind) => {
                return Err(RuntimeFault::Marshalling(format!(
                    "host returned an opaque {kind}"
                )))
            }
        })
    }
}

/// Error reported by a host function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Resolves and invokes functions living outside the engine
pub trait HostBridge: Send + Sync {
    /// Whether the bridge provides `name`
    fn provides(&self, name: &str) -> bool;

    /// Invoke `name` with marshalled arguments
    fn invoke(&self, name: &str, args: Vec<ForeignValue>) -> Result<ForeignValue, HostError>;
}

impl fmt::Debug for dyn HostBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostBridge")
    }
}

/// Marshal `args`, invoke `name` on `bridge` and marshal the result back
pub fn call_host(
    bridge: &dyn HostBridge,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeFault> {
    let foreign = args.iter().map(ForeignValue::from).collect();
    let result = bridge
        .invoke(name, foreign)
        .map_err(|err| RuntimeFault::HostFailure {
            name: name.to_string(),
            message: err.0,
        })?;
    Value::try_from(result)
}

type HostFn = Arc<dyn Fn(Vec<ForeignValue>) -> Result<ForeignValue, HostError> + Send + Sync>;

/// Bridge backed by closures registered at runtime
///
/// # Examples
///
/// ```
/// use interpreter::{ForeignValue, HostBridge, HostFunctions};
///
/// let host = HostFunctions::new();
/// host.register("answer", |_| Ok(ForeignValue::Int(42)));
/// assert!(host.provides("answer"));
/// assert_eq!(host.invoke("answer", vec![]).unwrap(), ForeignValue::Int(42));
/// ```
#[derive(Default)]
pub struct HostFunctions {
    functions: RwLock<HashMap<String, HostFn>>,
}

impl HostFunctions {
    /// Create an empty bridge
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a host function
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<ForeignValue>) -> Result<ForeignValue, HostError> + Send + Sync + 'static,
    {
        self.functions.write().insert(name.into(), Arc::new(f));
    }

    /// Names currently provided
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl HostBridge for HostFunctions {
    fn provides(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    fn invoke(&self, name: &str, args: Vec<ForeignValue>) -> Result<ForeignValue, HostError> {
        let function = self.functions.read().get(name).cloned();
        match function {
            Some(f) => f(args),
            None => Err(HostError(format!("no host function '{name}'"))),
        }
    }
}

impl fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunctions")
            .field("functions", &self.names())
            .finish()
    }
}
