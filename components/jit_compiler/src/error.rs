//! Compilation errors

use crate::backend::BackendTarget;
use core_types::{FaultCode, RegionId};
use thiserror::Error;

/// Why a region could not be compiled
///
/// Every variant is recoverable: the region keeps interpreting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The body uses something compiled regions cannot express
    #[error("{function}: unsupported construct: {construct}")]
    UnsupportedConstruct {
        /// Function being compiled
        function: String,
        /// Offending construct
        construct: String,
    },
    /// Bytecode could not be translated to IR
    #[error("{function}: IR translation failed: {reason}")]
    Translation {
        /// Function being compiled
        function: String,
        /// Cause
        reason: String,
    },
    /// The backend rejected the optimized IR
    #[error("{backend} lowering failed: {reason}")]
    Lowering {
        /// Backend that failed
        backend: BackendTarget,
        /// Cause
        reason: String,
    },
    /// GPU lowering requested but no device is available
    #[error("no GPU device available")]
    GpuUnavailable,
    /// A compilation for the region is already running
    #[error("{0} is already being compiled")]
    InProgress(RegionId),
    /// The background worker is gone
    #[error("compile worker unavailable")]
    WorkerUnavailable,
}

impl CompileError {
    /// Code in the runtime's fault taxonomy
    pub fn code(&self) -> FaultCode {
        match self {
            CompileError::UnsupportedConstruct { .. } => FaultCode::UNSUPPORTED_CONSTRUCT,
            CompileError::Translation { .. } => FaultCode::IR_TRANSLATION_FAILED,
            CompileError::Lowering { .. } => FaultCode::BACKEND_LOWERING_FAILED,
            CompileError::GpuUnavailable => FaultCode::GPU_UNAVAILABLE,
            CompileError::InProgress(_) | CompileError::WorkerUnavailable => {
                FaultCode::JIT_COMPILATION_FAILED
            }
        }
    }
}
