//! Fault requests, records and reports

use crate::recovery::RecoveryOutcome;
use chrono::{DateTime, Utc};
use core_types::{FaultCategory, FaultCode, RuntimeFault, Severity, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Operation a recovery strategy may re-run.
///
/// The error string is the attempt's diagnostic message.
pub type Operation = dyn FnMut() -> Result<Value, String> + Send;

enum FaultSource {
    Code(FaultCode),
    Fault(RuntimeFault),
}

/// One `handle_fault` call, assembled builder-style
///
/// # Examples
///
/// ```
/// use core_types::{FaultCode, Severity};
/// use fault_handling::FaultRequest;
///
/// let request = FaultRequest::code(FaultCode::TIMEOUT)
///     .message("peer did not answer")
///     .context("component", "storage")
///     .severity(Severity::High)
///     .strategy("retry")
///     .auto_recover(true);
/// # let _ = request;
/// ```
pub struct FaultRequest {
    source: FaultSource,
    pub(crate) message: Option<String>,
    pub(crate) context: BTreeMap<String, String>,
    pub(crate) severity: Option<Severity>,
    pub(crate) category: Option<FaultCategory>,
    pub(crate) strategy: Option<String>,
    pub(crate) auto_recover: bool,
    pub(crate) trace: Vec<String>,
    pub(crate) operation: Option<Box<Operation>>,
    pub(crate) fallback: Option<Value>,
}

impl FaultRequest {
    fn from_source(source: FaultSource) -> Self {
        Self {
            source,
            message: None,
            context: BTreeMap::new(),
            severity: None,
            category: None,
            strategy: None,
            auto_recover: false,
            trace: Vec::new(),
            operation: None,
            fallback: None,
        }
    }

    /// Request for a bare code
    pub fn code(code: FaultCode) -> Self {
        Self::from_source(FaultSource::Code(code))
    }

    /// Request for a native fault; its display becomes the default message
    pub fn fault(fault: RuntimeFault) -> Self {
        Self::from_source(FaultSource::Fault(fault))
    }

    /// Override the message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add a context entry
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override the catalog severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Override the category derived from the code band
    pub fn category(mut self, category: FaultCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Name the recovery strategy
    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    /// Run recovery immediately (default false)
    pub fn auto_recover(mut self, enabled: bool) -> Self {
        self.auto_recover = enabled;
        self
    }

    /// Attach a captured trace, innermost frame last
    pub fn trace(mut self, frames: Vec<String>) -> Self {
        self.trace = frames;
        self
    }

    /// Operation retried by strategies that re-run work
    pub fn operation<F>(mut self, operation: F) -> Self
    where
        F: FnMut() -> Result<Value, String> + Send + 'static,
    {
        self.operation = Some(Box::new(operation));
        self
    }

    /// Substitute value for the `fallback` strategy
    pub fn fallback_value(mut self, value: Value) -> Self {
        self.fallback = Some(value);
        self
    }

    pub(crate) fn resolved_code(&self) -> FaultCode {
        match &self.source {
            FaultSource::Code(code) => *code,
            FaultSource::Fault(fault) => fault.code(),
        }
    }

    pub(crate) fn native_message(&self) -> Option<String> {
        match &self.source {
            FaultSource::Code(_) => None,
            FaultSource::Fault(fault) => Some(fault.to_string()),
        }
    }
}

impl fmt::Debug for FaultRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultRequest")
            .field("code", &self.resolved_code())
            .field("message", &self.message)
            .field("severity", &self.severity)
            .field("strategy", &self.strategy)
            .field("auto_recover", &self.auto_recover)
            .finish_non_exhaustive()
    }
}

impl From<RuntimeFault> for FaultRequest {
    fn from(fault: RuntimeFault) -> Self {
        FaultRequest::fault(fault)
    }
}

/// An immutable, recorded fault
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    /// Monotonic sequence number within one handler
    pub id: u64,
    /// Coded identifier
    pub code: FaultCode,
    /// Symbolic name from the catalog
    pub name: String,
    /// Human-readable message
    pub message: String,
    /// Effective severity
    pub severity: Severity,
    /// Effective category
    pub category: FaultCategory,
    /// Free-form context
    pub context: BTreeMap<String, String>,
    /// When the fault was recorded
    pub timestamp: DateTime<Utc>,
    /// Frame names at the fault site, innermost last
    pub trace: Vec<String>,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} ({}, {})",
            self.code, self.name, self.message, self.severity, self.category
        )
    }
}

/// What the caller should do with a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The caller may continue, possibly with a recovered value
    Recoverable,
    /// The caller must decide on isolation or shutdown
    Propagate,
}

/// Caller-facing result of `handle_fault`
///
/// This is the only error type crossing the runtime's public surface.
#[derive(Debug, Clone, Error)]
#[error("{record}")]
pub struct FaultReport {
    /// The recorded fault
    pub record: Arc<FaultRecord>,
    /// Outcome, if recovery was attempted
    pub recovery: Option<RecoveryOutcome>,
    /// Propagation decision
    pub disposition: Disposition,
}

impl FaultReport {
    /// Code of the recorded fault
    pub fn code(&self) -> FaultCode {
        self.record.code
    }

    /// Severity of the recorded fault
    pub fn severity(&self) -> Severity {
        self.record.severity
    }

    /// Category of the recorded fault
    pub fn category(&self) -> FaultCategory {
        self.record.category
    }

    /// Message of the recorded fault
    pub fn message(&self) -> &str {
        &self.record.message
    }

    /// Whether recovery ran and succeeded
    pub fn recovered(&self) -> bool {
        self.recovery.as_ref().is_some_and(|r| r.success)
    }

    /// Value produced by a successful recovery
    pub fn recovered_value(&self) -> Option<&Value> {
        self.recovery
            .as_ref()
            .filter(|r| r.success)
            .and_then(|r| r.value.as_ref())
    }
}
