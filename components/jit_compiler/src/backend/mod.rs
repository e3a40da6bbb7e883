//! Backend selection and lowering
//!
//! A backend turns optimized IR into [`LoweredCode`]: labels resolved to
//! instruction indices, registers and slots sized, and target-specific ops
//! checked.

mod cpu;
mod gpu;

pub use cpu::CpuBackend;
pub use gpu::{GpuBackend, GpuDevice, SimulatedGpu};

use crate::compiled::LoweredCode;
use crate::config::BackendMode;
use crate::error::CompileError;
use crate::ir::IrFunction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a compiled region runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTarget {
    /// Host CPU
    Cpu,
    /// Accelerator device
    Gpu,
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendTarget::Cpu => write!(f, "cpu"),
            BackendTarget::Gpu => write!(f, "gpu"),
        }
    }
}

/// A code generator for one target
pub trait Backend: Send + Sync {
    /// Target this backend produces code for
    fn target(&self) -> BackendTarget;

    /// Lower optimized IR
    fn lower(&self, ir: IrFunction) -> Result<LoweredCode, CompileError>;
}

/// Resolve a backend mode to a target for a call carrying `data_volume` scalars.
///
/// `Auto` picks the GPU only when the volume strictly exceeds
/// `gpu_volume_threshold` and a device is available.
///
/// # Examples
///
/// ```
/// use jit_compiler::backend::{select_target, BackendTarget};
/// use jit_compiler::BackendMode;
///
/// assert_eq!(select_target(BackendMode::Auto, 5000, 1024, true), BackendTarget::Gpu);
/// assert_eq!(select_target(BackendMode::Auto, 5000, 1024, false), BackendTarget::Cpu);
/// assert_eq!(select_target(BackendMode::Auto, 10, 1024, true), BackendTarget::Cpu);
/// assert_eq!(select_target(BackendMode::Gpu, 10, 1024, false), BackendTarget::Gpu);
/// ```
pub fn select_target(
    mode: BackendMode,
    data_volume: usize,
    gpu_volume_threshold: usize,
    gpu_available: bool,
) -> BackendTarget {
    match mode {
        BackendMode::Cpu => BackendTarget::Cpu,
        BackendMode::Gpu => BackendTarget::Gpu,
        BackendMode::Auto if gpu_available && data_volume > gpu_volume_threshold => {
            BackendTarget::Gpu
        }
        BackendMode::Auto => BackendTarget::Cpu,
    }
}
