//! Operand stack
//!
//! Every pop is validated against the available depth before anything is
//! removed, so a failed pop leaves the stack exactly as it was.

use core_types::{RuntimeFault, Value};

/// LIFO value stack owned by one call chain
///
/// # Examples
///
/// ```
/// use core_types::{RuntimeFault, Value};
/// use interpreter::ExecutionStack;
///
/// let mut stack = ExecutionStack::new();
/// stack.push(Value::Int(1));
/// stack.push(Value::Int(2));
/// assert_eq!(stack.pop_n(2).unwrap(), vec![Value::Int(1), Value::Int(2)]);
///
/// stack.push(Value::Int(3));
/// assert!(matches!(stack.pop_n(2), Err(RuntimeFault::StackUnderflow { needed: 2, available: 1 })));
/// assert_eq!(stack.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStack {
    values: Vec<Value>,
    high_water: usize,
}

impl ExecutionStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty stack with room for `capacity` values
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            high_water: 0,
        }
    }

    /// Push a value
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
        self.high_water = self.high_water.max(self.values.len());
    }

    /// Fail with `StackUnderflow` unless at least `n` values are available
    pub fn require(&self, n: usize) -> Result<(), RuntimeFault> {
        if self.values.len() < n {
            return Err(RuntimeFault::StackUnderflow {
                needed: n,
                available: self.values.len(),
            });
        }
        Ok(())
    }

    /// Pop the top value
    pub fn pop(&mut self) -> Result<Value, RuntimeFault> {
        self.values.pop().ok_or(RuntimeFault::StackUnderflow {
            needed: 1,
            available: 0,
        })
    }

    /// Pop the top `n` values, returned in push order
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeFault> {
        self.require(n)?;
        let at = self.values.len() - n;
        Ok(self.values.split_off(at))
    }

    /// Pop the two topmost values as `(below, top)`
    pub fn pop_pair(&mut self) -> Result<(Value, Value), RuntimeFault> {
        self.require(2)?;
        let top = self.pop()?;
        let below = self.pop()?;
        Ok((below, top))
    }

    /// Top value without removing it
    pub fn peek(&self) -> Result<&Value, RuntimeFault> {
        self.values.last().ok_or(RuntimeFault::StackUnderflow {
            needed: 1,
            available: 0,
        })
    }

    /// Drop everything above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }

    /// Number of values on the stack
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deepest the stack has been since creation or the last reset
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    /// Restart high-water tracking from the current depth
    pub fn reset_high_water_mark(&mut self) {
        self.high_water = self.values.len();
    }

    /// Remove every value
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Values bottom to top
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}
