//! Pluggable recovery strategies
//!
//! A strategy receives a [`RecoveryContext`] describing the recorded fault,
//! the attempt and time budgets, and optionally an operation to re-run. It
//! returns a [`RecoveryOutcome`]. Strategies are looked up by name in a
//! [`StrategyRegistry`], so hosts can add their own without touching the
//! handler.

mod circuit_breaker;
mod component;
mod fallback;
mod retry;

pub use circuit_breaker::{CircuitBreakerStrategy, CircuitState};
pub use component::{
    ComponentRegistry, ComponentStatus, DegradeStrategy, IsolateRestartStrategy,
    ManagedComponent, ResetStrategy,
};
pub use fallback::FallbackStrategy;
pub use retry::{backoff_delay, RetryStrategy};

use crate::record::{FaultRecord, Operation};
use core_types::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One attempt made by a strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Whether this attempt succeeded
    pub success: bool,
    /// Diagnostic message of the attempt
    pub message: String,
    /// Delay slept before the attempt
    pub delay: Duration,
}

/// Result of running a strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryOutcome {
    /// Strategy that ran
    pub strategy: String,
    /// Whether recovery succeeded
    pub success: bool,
    /// Attempts made
    pub attempts: u32,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Diagnostic message; on failure, the last attempt's message
    pub message: String,
    /// Substitute or recomputed value
    pub value: Option<Value>,
    /// Per-attempt history
    pub history: Vec<AttemptRecord>,
    /// Whether attempts stopped because the next backoff would pass the deadline
    pub deadline_reached: bool,
}

impl RecoveryOutcome {
    /// Successful outcome with a single attempt
    pub fn succeeded(strategy: &str, message: impl Into<String>) -> Self {
        Self {
            strategy: strategy.to_string(),
            success: true,
            attempts: 1,
            elapsed: Duration::ZERO,
            message: message.into(),
            value: None,
            history: Vec::new(),
            deadline_reached: false,
        }
    }

    /// Failed outcome with a single attempt
    pub fn failed(strategy: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::succeeded(strategy, message)
        }
    }

    /// Attach a value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Everything a strategy may use while recovering
pub struct RecoveryContext<'a> {
    /// The fault being recovered
    pub record: &'a FaultRecord,
    /// Attempt budget
    pub max_attempts: u32,
    /// Time by which recovery must give up
    pub deadline: Instant,
    /// First retry backoff
    pub base_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Substitute value supplied by the caller
    pub fallback: Option<Value>,
    operation: Option<&'a mut Operation>,
}

impl<'a> RecoveryContext<'a> {
    /// Create a context without an operation
    pub fn new(record: &'a FaultRecord, max_attempts: u32, budget: Duration) -> Self {
        Self {
            record,
            max_attempts,
            deadline: Instant::now() + budget,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
            fallback: None,
            operation: None,
        }
    }

    /// Attach the operation to re-run
    pub fn with_operation(mut self, operation: &'a mut Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Set the backoff curve
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    /// Set the substitute value
    pub fn with_fallback(mut self, value: Option<Value>) -> Self {
        self.fallback = value;
        self
    }

    /// Whether an operation is attached
    pub fn has_operation(&self) -> bool {
        self.operation.is_some()
    }

    /// Run the attached operation once
    pub fn run_operation(&mut self) -> Option<Result<Value, String>> {
        self.operation.as_mut().map(|op| (**op)())
    }

    /// Context value, e.g. the `component` key
    pub fn context(&self, key: &str) -> Option<&str> {
        self.record.context.get(key).map(String::as_str)
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// A named recovery strategy
pub trait RecoveryStrategy: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Attempt recovery
    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome;
}

/// Strategy built from a closure
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&mut RecoveryContext<'_>) -> RecoveryOutcome + Send + Sync,
{
    /// Wrap `f` under `name`
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> RecoveryStrategy for FnStrategy<F>
where
    F: Fn(&mut RecoveryContext<'_>) -> RecoveryOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        (self.f)(ctx)
    }
}

/// Name-to-strategy registry
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn RecoveryStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy
    pub fn with_builtins(
        components: Arc<ComponentRegistry>,
        breaker: Arc<CircuitBreakerStrategy>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RetryStrategy));
        registry.register(Arc::new(FallbackStrategy::default()));
        registry.register(Arc::new(ResetStrategy::new(components.clone())));
        registry.register(Arc::new(IsolateRestartStrategy::new(components.clone())));
        registry.register(Arc::new(DegradeStrategy::new(components)));
        registry.register(breaker);
        registry
    }

    /// Add or replace a strategy under its own name
    pub fn register(&mut self, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Look up a strategy
    pub fn get(&self, name: &str) -> Option<Arc<dyn RecoveryStrategy>> {
        self.strategies.get(name).cloned()
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }
}
