//! Runtime configuration
//!
//! One TOML document configures every subsystem:
//!
//! ```toml
//! [engine]
//! max_call_depth = 128
//!
//! [jit]
//! hot_threshold = 50
//! backend = "auto"
//!
//! [faults]
//! max_attempts = 5
//!
//! [telemetry]
//! buffer_capacity = 2048
//! ```

use core_types::FaultCode;
use fault_handling::FaultConfig;
use jit_compiler::JitConfig;
use serde::{Deserialize, Serialize};
use telemetry::TelemetryConfig;
use thiserror::Error;

/// Execution engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames allowed in one call chain before `STACK_OVERFLOW`
    pub max_call_depth: usize,
    /// Initial operand stack capacity
    pub stack_capacity: usize,
    /// Register `len`, `abs`, `min`, `max`, `sum` and `print`
    pub builtins: bool,
    /// Log every dispatched instruction at `trace` level
    pub trace_instructions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            stack_capacity: 256,
            builtins: true,
            trace_instructions: false,
        }
    }
}

/// Invalid or unparsable configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The document is not valid TOML for this schema
    #[error("configuration parse error: {0}")]
    Parse(String),
    /// A value is out of range
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

impl ConfigError {
    /// Always `INVALID_CONFIGURATION`
    pub fn code(&self) -> FaultCode {
        FaultCode::INVALID_CONFIGURATION
    }
}

/// Configuration of every runtime subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Execution engine
    pub engine: EngineConfig,
    /// Profiler and JIT
    pub jit: JitConfig,
    /// Fault handler and recovery
    pub faults: FaultConfig,
    /// Metric registry and collector
    pub telemetry: TelemetryConfig,
}

impl RuntimeConfig {
    /// Parse and validate a TOML document; missing keys take defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use interpreter::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::from_toml_str("[jit]\nhot_threshold = 10\n").unwrap();
    /// assert_eq!(config.jit.hot_threshold, 10);
    /// assert_eq!(config.engine.max_call_depth, 256);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reject values no subsystem can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.engine.max_call_depth == 0, "engine.max_call_depth"),
            (self.jit.hot_threshold == 0, "jit.hot_threshold"),
            (self.faults.max_attempts == 0, "faults.max_attempts"),
            (self.faults.history_capacity == 0, "faults.history_capacity"),
            (self.telemetry.buffer_capacity == 0, "telemetry.buffer_capacity"),
            (self.telemetry.collector_interval_ms == 0, "telemetry.collector_interval_ms"),
        ];
        match checks.into_iter().find(|(bad, _)| *bad) {
            Some((_, field)) => Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }
}
