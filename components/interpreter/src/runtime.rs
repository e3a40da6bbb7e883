//! Runtime assembly
//!
//! [`Runtime`] builds the shared subsystems from one [`RuntimeConfig`],
//! starts the background collector when configured, and hands out VMs that
//! share them.

use crate::config::{ConfigError, RuntimeConfig};
use crate::host::HostBridge;
use crate::vm::VM;
use bytecode_system::FunctionDescriptor;
use core_types::{RegionId, RuntimeFault, Value};
use fault_handling::{ErrorMetrics, FaultHandler};
use jit_compiler::{GpuDevice, JitCompiler};
use std::sync::Arc;
use telemetry::{
    Collector, GpuProbe, MemoryProbe, MetricRegistry, PerformanceReport, SystemProbe,
    UtilizationSource,
};
use tracing::{info, warn};

/// Fully wired runtime
///
/// # Examples
///
/// ```
/// use bytecode_system::{BytecodeChunk, Opcode};
/// use core_types::Value;
/// use interpreter::{Runtime, RuntimeConfig};
///
/// let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
/// let mut vm = runtime.vm();
///
/// let mut chunk = BytecodeChunk::new("main");
/// chunk.emit_constant(Value::Int(6));
/// chunk.emit_constant(Value::Int(7));
/// chunk.emit(Opcode::BinaryMul);
/// chunk.emit(Opcode::ReturnValue);
///
/// assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(42));
/// assert!(runtime.shutdown());
/// ```
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    root: VM,
    collector: Option<Collector>,
}

impl Runtime {
    /// Build a CPU-only runtime
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Build a runtime whose JIT can lower to `device`; the collector
    /// samples its utilization
    pub fn with_gpu<D>(config: RuntimeConfig, device: Arc<D>) -> Result<Self, ConfigError>
    where
        D: GpuDevice + UtilizationSource + 'static,
    {
        let utilization: Arc<dyn UtilizationSource> = device.clone();
        let device: Arc<dyn GpuDevice> = device;
        Self::build(config, Some((device, utilization)))
    }

    fn build(
        config: RuntimeConfig,
        gpu: Option<(Arc<dyn GpuDevice>, Arc<dyn UtilizationSource>)>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let telemetry = Arc::new(MetricRegistry::new(config.telemetry.clone()));
        telemetry.register_runtime_metrics();
        let faults = Arc::new(FaultHandler::new(config.faults.clone()));

        let mut probes: Vec<Box<dyn SystemProbe>> = vec![Box::new(MemoryProbe)];
        let jit = match gpu {
            Some((device, utilization)) => {
                probes.push(Box::new(GpuProbe::new(utilization)));
                JitCompiler::with_gpu(config.jit.clone(), telemetry.clone(), device)
            }
            None => JitCompiler::new(config.jit.clone(), telemetry.clone()),
        };

        let collector = if config.telemetry.enabled && config.telemetry.collector_enabled {
            match Collector::start(
                telemetry.clone(),
                probes,
                config.telemetry.collector_interval(),
            ) {
                Ok(collector) => Some(collector),
                Err(err) => {
                    warn!(%err, "collector not started; continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let root = VM::new(config.engine.clone(), faults, telemetry, Arc::new(jit));
        info!(
            hot_threshold = config.jit.hot_threshold,
            backend = ?config.jit.backend,
            gpu = root.jit().gpu_available(),
            collector = collector.is_some(),
            "runtime ready"
        );
        Ok(Self {
            config,
            root,
            collector,
        })
    }

    /// A new call chain sharing this runtime's registries
    pub fn vm(&self) -> VM {
        self.root.fork()
    }

    /// Register a user function for every VM of this runtime
    pub fn register_function(&self, descriptor: FunctionDescriptor) -> RegionId {
        self.root.register_function(descriptor)
    }

    /// Register a native function for every VM of this runtime
    pub fn register_native<F>(&self, name: &str, arity: Option<usize>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync + 'static,
    {
        self.root.register_native(name, arity, f);
    }

    /// Install the host bridge for every VM of this runtime
    pub fn set_host_bridge(&self, bridge: Arc<dyn HostBridge>) {
        self.root.set_host_bridge(bridge);
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Shared fault handler
    pub fn faults(&self) -> &Arc<FaultHandler> {
        self.root.faults()
    }

    /// Shared metric registry
    pub fn telemetry(&self) -> &Arc<MetricRegistry> {
        self.root.telemetry()
    }

    /// Shared JIT compiler
    pub fn jit(&self) -> &Arc<JitCompiler> {
        self.root.jit()
    }

    /// Whether the background collector is sampling
    pub fn collector_running(&self) -> bool {
        self.collector.as_ref().is_some_and(Collector::is_running)
    }

    /// Fault counters and recent records
    pub fn error_metrics(&self) -> ErrorMetrics {
        self.faults().get_error_metrics()
    }

    /// Metric summaries, derived rates and alerts
    pub fn performance_report(&self) -> PerformanceReport {
        self.telemetry().performance_report()
    }

    /// Stop the collector within the configured timeout.
    ///
    /// Returns false if the collector thread had to be detached.
    pub fn shutdown(mut self) -> bool {
        let stopped = match self.collector.take() {
            Some(collector) => collector.stop(self.config.telemetry.shutdown_timeout()),
            None => true,
        };
        info!(stopped, "runtime shut down");
        stopped
    }
}
