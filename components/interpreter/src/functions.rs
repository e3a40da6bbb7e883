//! Function table
//!
//! Three callee kinds share one namespace and resolve in a fixed order:
//! user-defined functions, then native builtins, then whatever the host
//! bridge provides.

use crate::host::HostBridge;
use bytecode_system::FunctionDescriptor;
use core_types::{RegionId, RuntimeFault, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Signature of a native function
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync>;

/// A user-defined function and the region it is profiled under
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    /// Region id assigned at registration
    pub region: RegionId,
    /// Name, ordered parameters and body
    pub descriptor: FunctionDescriptor,
}

/// A function implemented in Rust
#[derive(Clone)]
pub struct NativeFunction {
    /// Name callers resolve
    pub name: String,
    /// Required argument count; `None` accepts any count
    pub arity: Option<usize>,
    func: NativeFn,
}

impl NativeFunction {
    /// Wrap `func` under `name`
    pub fn new<F>(name: impl Into<String>, arity: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    /// Fail with `ArityMismatch` unless `found` arguments are acceptable
    pub fn check_arity(&self, found: usize) -> Result<(), RuntimeFault> {
        match self.arity {
            Some(expected) if expected != found => Err(RuntimeFault::ArityMismatch {
                name: self.name.clone(),
                expected,
                found,
            }),
            _ => Ok(()),
        }
    }

    /// Invoke with already popped arguments
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A resolved callee
#[derive(Debug, Clone)]
pub enum Callee {
    /// Bytecode function
    User(Arc<UserFunction>),
    /// Rust function
    Native(Arc<NativeFunction>),
    /// Function behind the host bridge
    Host(Arc<dyn HostBridge>),
}

impl Callee {
    /// Short kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Callee::User(_) => "user",
            Callee::Native(_) => "native",
            Callee::Host(_) => "host",
        }
    }
}

/// Registry of every callable name
#[derive(Debug, Default, Clone)]
pub struct FunctionTable {
    user: HashMap<String, Arc<UserFunction>>,
    native: HashMap<String, Arc<NativeFunction>>,
    host: Option<Arc<dyn HostBridge>>,
    next_region: u64,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user function and return its region id.
    ///
    /// Re-registering an identical descriptor keeps the existing region so
    /// its profile and compiled code stay valid; a changed body gets a
    /// fresh region.
    pub fn register_user(&mut self, descriptor: FunctionDescriptor) -> RegionId {
        if let Some(existing) = self.user.get(&descriptor.name) {
            if existing.descriptor == descriptor {
                return existing.region;
            }
        }
        self.next_region += 1;
        let region = RegionId(self.next_region);
        debug!(function = %descriptor.name, region = %region, arity = descriptor.arity(), "user function registered");
        self.user.insert(
            descriptor.name.clone(),
            Arc::new(UserFunction { region, descriptor }),
        );
        region
    }

    /// Register or replace a native function
    pub fn register_native(&mut self, native: NativeFunction) {
        self.native.insert(native.name.clone(), Arc::new(native));
    }

    /// Install the host bridge consulted last
    pub fn set_host_bridge(&mut self, bridge: Arc<dyn HostBridge>) {
        self.host = Some(bridge);
    }

    /// Resolve `name`: user, then native, then host
    pub fn resolve(&self, name: &str) -> Option<Callee> {
        if let Some(user) = self.user.get(name) {
            return Some(Callee::User(user.clone()));
        }
        if let Some(native) = self.native.get(name) {
            return Some(Callee::Native(native.clone()));
        }
        self.host
            .as_ref()
            .filter(|bridge| bridge.provides(name))
            .map(|bridge| Callee::Host(bridge.clone()))
    }

    /// Registered user function
    pub fn user(&self, name: &str) -> Option<&Arc<UserFunction>> {
        self.user.get(name)
    }

    /// User function profiled under `region`
    pub fn user_by_region(&self, region: RegionId) -> Option<&Arc<UserFunction>> {
        self.user.values().find(|f| f.region == region)
    }

    /// Number of user functions
    pub fn user_count(&self) -> usize {
        self.user.len()
    }

    /// Names of registered natives, sorted
    pub fn native_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.native.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
