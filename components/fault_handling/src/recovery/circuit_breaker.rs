//! Circuit-breaker recovery
//!
//! Circuits are keyed by the fault's `component` context entry, or by its
//! code when no component is named.

use super::{RecoveryContext, RecoveryOutcome, RecoveryStrategy};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow; failures are counted
    Closed,
    /// Requests are rejected until the reset timeout elapses
    Open,
    /// One trial request is allowed through
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            opened_at: None,
        }
    }

    fn refresh(&mut self, reset_timeout: Duration) {
        if self.state == CircuitState::Open
            && self.opened_at.is_some_and(|at| at.elapsed() >= reset_timeout)
        {
            self.state = CircuitState::HalfOpen;
        }
    }

    fn record_failure(&mut self, threshold: u32) {
        self.failures += 1;
        if self.state == CircuitState::HalfOpen || self.failures >= threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.failures = 0;
        self.opened_at = None;
    }
}

/// Trips open after repeated failures and rejects work until reset
pub struct CircuitBreakerStrategy {
    failure_threshold: u32,
    reset_timeout: Duration,
    circuits: Mutex<HashMap<String, Circuit>>,
}

impl CircuitBreakerStrategy {
    /// Breaker opening after `failure_threshold` failures
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of the circuit for `key`
    pub fn state(&self, key: &str) -> CircuitState {
        let mut circuits = self.circuits.lock();
        match circuits.get_mut(key) {
            Some(circuit) => {
                circuit.refresh(self.reset_timeout);
                circuit.state
            }
            None => CircuitState::Closed,
        }
    }

    /// Whether work for `key` may proceed
    pub fn allow_request(&self, key: &str) -> bool {
        self.state(key) != CircuitState::Open
    }

    /// Close the circuit for `key` manually
    pub fn reset(&self, key: &str) {
        self.circuits.lock().remove(key);
    }

    fn key(ctx: &RecoveryContext<'_>) -> String {
        ctx.context("component")
            .map(str::to_string)
            .unwrap_or_else(|| ctx.record.code.to_string())
    }
}

impl RecoveryStrategy for CircuitBreakerStrategy {
    fn name(&self) -> &str {
        "circuit_breaker"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let started = Instant::now();
        let key = Self::key(ctx);

        // The lock is not held while the operation runs.
        let state = self.state(&key);
        if state == CircuitState::Open {
            let mut outcome =
                RecoveryOutcome::failed(self.name(), format!("circuit '{}' is open", key));
            outcome.attempts = 0;
            return outcome;
        }

        let trial = ctx.run_operation();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(key.clone()).or_insert_with(Circuit::new);
        let mut outcome = match trial {
            Some(Ok(value)) => {
                circuit.record_success();
                RecoveryOutcome::succeeded(self.name(), format!("circuit '{}' closed", key))
                    .with_value(value)
            }
            Some(Err(message)) => {
                circuit.record_failure(self.failure_threshold);
                RecoveryOutcome::failed(self.name(), message)
            }
            None => {
                // No trial to run: the fault itself counts as a failure.
                circuit.record_failure(self.failure_threshold);
                let message = format!(
                    "circuit '{}' {:?} ({}/{} failures)",
                    key, circuit.state, circuit.failures, self.failure_threshold
                );
                if circuit.state == CircuitState::Open {
                    RecoveryOutcome::failed(self.name(), message)
                } else {
                    RecoveryOutcome::succeeded(self.name(), message)
                }
            }
        };
        if circuit.state == CircuitState::Open {
            warn!(circuit = %key, failures = circuit.failures, "circuit opened");
        }
        outcome.elapsed = started.elapsed();
        outcome
    }
}
