//! Telemetry errors

use core_types::FaultCode;
use thiserror::Error;

/// Errors raised by the metric registry and collector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Metric used before registration
    #[error("metric '{0}' is not registered")]
    NotRegistered(String),
    /// Metric re-registered with a different kind
    #[error("metric '{name}' is a {registered}, not a {requested}")]
    KindMismatch {
        /// Metric name
        name: String,
        /// Kind it was registered with
        registered: String,
        /// Kind requested now
        requested: String,
    },
    /// Sample rejected
    #[error("invalid sample for '{name}': {reason}")]
    InvalidValue {
        /// Metric name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
    /// Collector thread could not be started
    #[error("collector failed to start: {0}")]
    CollectorSpawn(String),
    /// Alert id not known
    #[error("alert {0} does not exist")]
    UnknownAlert(u64),
}

impl TelemetryError {
    /// Code in the runtime's fault taxonomy
    pub fn code(&self) -> FaultCode {
        match self {
            TelemetryError::NotRegistered(_) => FaultCode::METRIC_NOT_REGISTERED,
            TelemetryError::KindMismatch { .. } | TelemetryError::InvalidValue { .. } => {
                FaultCode::TYPE_MISMATCH
            }
            TelemetryError::CollectorSpawn(_) | TelemetryError::UnknownAlert(_) => {
                FaultCode::INTERNAL
            }
        }
    }
}
