//! GPU backend and device abstraction
//!
//! The backend decides that and when a region runs on a device; what the
//! device does with a kernel is behind [`GpuDevice`].

use super::{Backend, BackendTarget};
use crate::compiled::LoweredCode;
use crate::error::CompileError;
use crate::ir::{IrFunction, IrOp, Kernel, Reg};
use core_types::{ops, RuntimeFault, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::UtilizationSource;

/// An accelerator that can run outlined kernels
pub trait GpuDevice: Send + Sync {
    /// Device name
    fn name(&self) -> &str;

    /// Whether the device can accept work
    fn is_available(&self) -> bool;

    /// Run `kernel` on `inputs` (in kernel input order), returning the
    /// kernel's outputs in order
    fn launch(&self, kernel: &Kernel, inputs: &[Value]) -> Result<Vec<Value>, RuntimeFault>;

    /// Current utilization in percent, if the device reports one
    fn utilization(&self) -> Option<f64> {
        None
    }
}

impl fmt::Debug for dyn GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuDevice")
            .field("name", &self.name())
            .field("available", &self.is_available())
            .finish()
    }
}

/// Evaluate a kernel body on the host with the shared operator semantics
pub fn evaluate_kernel(kernel: &Kernel, inputs: &[Value]) -> Result<Vec<Value>, RuntimeFault> {
    if inputs.len() != kernel.inputs.len() {
        return Err(RuntimeFault::Internal(format!(
            "kernel#{} takes {} input(s), {} given",
            kernel.id,
            kernel.inputs.len(),
            inputs.len()
        )));
    }
    let mut regs: HashMap<Reg, Value> = kernel.inputs.iter().copied().zip(inputs.iter().cloned()).collect();
    let read = |regs: &HashMap<Reg, Value>, r: Reg| {
        regs.get(&r)
            .cloned()
            .ok_or_else(|| RuntimeFault::Internal(format!("kernel#{} read undefined {}", kernel.id, r)))
    };
    for op in &kernel.body {
        let IrOp::Vector { dst, op, lhs, rhs } = op else {
            return Err(RuntimeFault::Internal(format!(
                "kernel#{} contains a non-vector op",
                kernel.id
            )));
        };
        let value = ops::binary(*op, &read(&regs, *lhs)?, &read(&regs, *rhs)?)?;
        regs.insert(*dst, value);
    }
    kernel.outputs.iter().map(|r| read(&regs, *r)).collect()
}

/// Host-backed device that runs kernels with the shared operator semantics
/// and accounts busy time for utilization
#[derive(Debug)]
pub struct SimulatedGpu {
    name: String,
    available: bool,
    created: Instant,
    state: Mutex<DeviceState>,
}

#[derive(Debug, Default)]
struct DeviceState {
    busy: Duration,
    launches: u64,
}

impl SimulatedGpu {
    /// An available device
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            created: Instant::now(),
            state: Mutex::new(DeviceState::default()),
        }
    }

    /// A device that reports itself unavailable
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    /// Kernels launched so far
    pub fn launches(&self) -> u64 {
        self.state.lock().launches
    }
}

impl GpuDevice for SimulatedGpu {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn launch(&self, kernel: &Kernel, inputs: &[Value]) -> Result<Vec<Value>, RuntimeFault> {
        if !self.available {
            return Err(RuntimeFault::Internal(format!("device {} is unavailable", self.name)));
        }
        let started = Instant::now();
        let result = evaluate_kernel(kernel, inputs);
        let mut state = self.state.lock();
        state.busy += started.elapsed();
        state.launches += 1;
        result
    }

    fn utilization(&self) -> Option<f64> {
        let elapsed = self.created.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return Some(0.0);
        }
        let busy = self.state.lock().busy.as_secs_f64();
        Some((busy / elapsed * 100.0).min(100.0))
    }
}

impl UtilizationSource for SimulatedGpu {
    fn utilization(&self) -> Option<f64> {
        GpuDevice::utilization(self)
    }
}

/// Lowers IR for a [`GpuDevice`]
#[derive(Clone)]
pub struct GpuBackend {
    device: Arc<dyn GpuDevice>,
}

impl GpuBackend {
    /// Backend bound to `device`
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        Self { device }
    }

    /// The bound device
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }
}

impl Backend for GpuBackend {
    fn target(&self) -> BackendTarget {
        BackendTarget::Gpu
    }

    fn lower(&self, ir: IrFunction) -> Result<LoweredCode, CompileError> {
        if !self.device.is_available() {
            return Err(CompileError::GpuUnavailable);
        }
        LoweredCode::lower(ir, BackendTarget::Gpu)
    }
}
