//! CPU backend

use super::{Backend, BackendTarget};
use crate::compiled::LoweredCode;
use crate::error::CompileError;
use crate::ir::{IrFunction, IrOp};

/// Lowers IR for host execution
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn target(&self) -> BackendTarget {
        BackendTarget::Cpu
    }

    fn lower(&self, ir: IrFunction) -> Result<LoweredCode, CompileError> {
        if ir.ops.iter().any(|op| matches!(op, IrOp::Kernel { .. })) {
            return Err(CompileError::Lowering {
                backend: BackendTarget::Cpu,
                reason: "device kernels cannot run on the CPU backend".to_string(),
            });
        }
        LoweredCode::lower(ir, BackendTarget::Cpu)
    }
}
