//! The JIT compiler front door
//!
//! [`JitCompiler`] owns the profiler, the backends and (for the background
//! policy) one worker thread. The engine calls [`JitCompiler::on_call`] for
//! every user-function call and follows the returned [`Dispatch`].

use crate::backend::{select_target, Backend, BackendTarget, CpuBackend, GpuBackend, GpuDevice};
use crate::compiled::CompiledRegion;
use crate::config::{CompilePolicy, JitConfig};
use crate::error::CompileError;
use crate::ir::IrFunction;
use crate::passes::PassPipeline;
use crate::profiler::{HotPathProfiler, ProfileDecision, RegionProfile};
use bytecode_system::FunctionDescriptor;
use core_types::{PromotionState, RegionId};
use crossbeam::channel::{unbounded, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use telemetry::{names, MetricKind, MetricRegistry};
use tracing::{debug, info, warn};

/// How to run one call
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Interpret the bytecode
    Interpret,
    /// Invoke the compiled handle
    Compiled(Arc<CompiledRegion>),
    /// Compilation was attempted for this call and failed; interpret it
    CompileFailed(CompileError),
}

/// Compiler statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilerStats {
    /// Successful compilations
    pub compilations: u64,
    /// Failed compilations
    pub failures: u64,
    /// Compile requests answered from an installed handle
    pub cache_hits: u64,
    /// Regions compiled for the CPU
    pub cpu_regions: u64,
    /// Regions compiled for the GPU
    pub gpu_regions: u64,
    /// Time spent compiling
    pub total_compile_time: Duration,
    /// Rewrites per pass, summed over compilations
    pub pass_rewrites: BTreeMap<String, u64>,
}

struct CompileJob {
    region: RegionId,
    function: FunctionDescriptor,
    data_volume: usize,
}

struct JitCore {
    config: JitConfig,
    profiler: HotPathProfiler,
    cpu: CpuBackend,
    gpu: Option<GpuBackend>,
    telemetry: Arc<MetricRegistry>,
    stats: Mutex<CompilerStats>,
    background_failures: Mutex<Vec<(RegionId, CompileError)>>,
}

impl JitCore {
    fn gpu_available(&self) -> bool {
        self.gpu
            .as_ref()
            .is_some_and(|gpu| gpu.device().is_available())
    }

    fn target_for(&self, data_volume: usize) -> BackendTarget {
        select_target(
            self.config.backend,
            data_volume,
            self.config.gpu_volume_threshold,
            self.gpu_available(),
        )
    }

    fn build(
        &self,
        region: RegionId,
        function: &FunctionDescriptor,
        target: BackendTarget,
        started: Instant,
    ) -> Result<CompiledRegion, CompileError> {
        let mut ir = IrFunction::translate(function)?;
        let reports = PassPipeline::for_target(&self.config, target).run(&mut ir);
        let (code, device) = match target {
            BackendTarget::Cpu => (self.cpu.lower(ir)?, None),
            BackendTarget::Gpu => {
                let gpu = self.gpu.as_ref().ok_or(CompileError::GpuUnavailable)?;
                (gpu.lower(ir)?, Some(gpu.device().clone()))
            }
        };
        Ok(CompiledRegion::new(
            region,
            code,
            device,
            reports,
            started.elapsed(),
        ))
    }

    /// Compile a region already in `Compiling`, installing or failing it
    fn compile_now(
        &self,
        region: RegionId,
        function: &FunctionDescriptor,
        data_volume: usize,
    ) -> Result<Arc<CompiledRegion>, CompileError> {
        let target = self.target_for(data_volume);
        let started = Instant::now();
        let built = {
            let _timer = self.telemetry.start_timer(names::JIT_COMPILE_TIME);
            self.build(region, function, target, started)
        };

        match built {
            Ok(compiled) => {
                let handle = Arc::new(compiled);
                self.profiler.complete(region, handle.clone());
                self.record_success(&handle);
                info!(
                    region = %region,
                    function = %function.name,
                    backend = %target,
                    elapsed_us = handle.compile_time().as_micros() as u64,
                    "region compiled"
                );
                Ok(handle)
            }
            Err(err) => {
                self.profiler.fail(region);
                self.record_failure(started.elapsed());
                warn!(
                    region = %region,
                    function = %function.name,
                    backend = %target,
                    code = %err.code(),
                    %err,
                    "region compilation failed; interpreting"
                );
                Err(err)
            }
        }
    }

    fn record_success(&self, handle: &CompiledRegion) {
        {
            let mut stats = self.stats.lock();
            stats.compilations += 1;
            stats.total_compile_time += handle.compile_time();
            match handle.target() {
                BackendTarget::Cpu => stats.cpu_regions += 1,
                BackendTarget::Gpu => stats.gpu_regions += 1,
            }
            for report in handle.passes() {
                *stats.pass_rewrites.entry(report.pass.to_string()).or_insert(0) +=
                    report.rewrites as u64;
            }
        }
        if let Err(err) = self.telemetry.increment(names::JIT_COMPILATIONS, 1) {
            debug!(%err, "compilation not counted");
        }
    }

    fn record_failure(&self, elapsed: Duration) {
        {
            let mut stats = self.stats.lock();
            stats.failures += 1;
            stats.total_compile_time += elapsed;
        }
        if let Err(err) = self.telemetry.increment(names::JIT_FAILURES, 1) {
            debug!(%err, "compile failure not counted");
        }
    }
}

struct CompileWorker {
    sender: Option<Sender<CompileJob>>,
    handle: Option<JoinHandle<()>>,
}

impl CompileWorker {
    fn spawn(core: Arc<JitCore>) -> Option<Self> {
        let (sender, receiver) = unbounded::<CompileJob>();
        let spawned = thread::Builder::new()
            .name("jit-compile-worker".to_string())
            .spawn(move || {
                for job in receiver {
                    if let Err(err) = core.compile_now(job.region, &job.function, job.data_volume) {
                        core.background_failures.lock().push((job.region, err));
                    }
                }
                debug!("compile worker exiting");
            });
        match spawned {
            Ok(handle) => Some(Self {
                sender: Some(sender),
                handle: Some(handle),
            }),
            Err(err) => {
                warn!(%err, "compile worker failed to start; compiling synchronously");
                None
            }
        }
    }
}

impl Drop for CompileWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker's loop after queued jobs.
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("compile worker panicked");
            }
        }
    }
}

/// Hot-path profiler plus compilation pipeline
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
/// use core_types::{RegionId, Value};
/// use jit_compiler::{Dispatch, JitCompiler, JitConfig};
/// use telemetry::MetricRegistry;
///
/// let mut body = BytecodeChunk::new("square");
/// body.emit(Opcode::LoadName("x".into()));
/// body.emit(Opcode::LoadName("x".into()));
/// body.emit(Opcode::BinaryMul);
/// body.emit(Opcode::ReturnValue);
/// let square = FunctionDescriptor::new("square", ["x"], body);
///
/// let config = JitConfig { hot_threshold: 1, ..JitConfig::default() };
/// let jit = JitCompiler::new(config, Arc::new(MetricRegistry::default()));
/// let region = RegionId(1);
/// assert!(matches!(jit.on_call(region, &square, 1), Dispatch::Interpret));
/// let Dispatch::Compiled(handle) = jit.on_call(region, &square, 1) else { panic!() };
/// assert_eq!(handle.invoke(&[Value::Int(7)]).unwrap(), Value::Int(49));
/// ```
pub struct JitCompiler {
    core: Arc<JitCore>,
    worker: Option<CompileWorker>,
}

impl JitCompiler {
    /// Compiler with a CPU backend only
    pub fn new(config: JitConfig, telemetry: Arc<MetricRegistry>) -> Self {
        Self::build(config, telemetry, None)
    }

    /// Compiler with CPU and GPU backends
    pub fn with_gpu(
        config: JitConfig,
        telemetry: Arc<MetricRegistry>,
        device: Arc<dyn GpuDevice>,
    ) -> Self {
        Self::build(config, telemetry, Some(GpuBackend::new(device)))
    }

    fn build(config: JitConfig, telemetry: Arc<MetricRegistry>, gpu: Option<GpuBackend>) -> Self {
        telemetry.register_metric(
            names::JIT_COMPILATIONS,
            MetricKind::Counter,
            "successful region compilations",
            "regions",
        );
        telemetry.register_metric(
            names::JIT_COMPILE_TIME,
            MetricKind::Timer,
            "time spent compiling one region",
            "ms",
        );
        telemetry.register_metric(
            names::JIT_FAILURES,
            MetricKind::Counter,
            "failed region compilations",
            "regions",
        );

        let core = Arc::new(JitCore {
            profiler: HotPathProfiler::new(config.hot_threshold),
            cpu: CpuBackend,
            gpu,
            telemetry,
            stats: Mutex::new(CompilerStats::default()),
            background_failures: Mutex::new(Vec::new()),
            config,
        });
        let worker = match core.config.policy {
            CompilePolicy::Background if core.config.enabled => CompileWorker::spawn(core.clone()),
            _ => None,
        };
        Self { core, worker }
    }

    /// Active configuration
    pub fn config(&self) -> &JitConfig {
        &self.core.config
    }

    /// The hot-path profiler
    pub fn profiler(&self) -> &HotPathProfiler {
        &self.core.profiler
    }

    /// Whether a GPU backend with an available device is configured
    pub fn gpu_available(&self) -> bool {
        self.core.gpu_available()
    }

    /// Target a call carrying `data_volume` scalars would compile for
    pub fn select_target(&self, data_volume: usize) -> BackendTarget {
        self.core.target_for(data_volume)
    }

    /// Count one call of `region` and decide how to run it.
    ///
    /// Under the synchronous policy the promoting call compiles inline and
    /// already runs compiled. Under the background policy it enqueues the
    /// job and interprets until the handle is installed.
    pub fn on_call(
        &self,
        region: RegionId,
        function: &FunctionDescriptor,
        data_volume: usize,
    ) -> Dispatch {
        if !self.core.config.enabled {
            return Dispatch::Interpret;
        }
        match self.core.profiler.record(region) {
            ProfileDecision::Interpret => Dispatch::Interpret,
            ProfileDecision::Compiled(handle) => Dispatch::Compiled(handle),
            ProfileDecision::Promote => {
                if !self.core.profiler.begin_compile(region) {
                    return Dispatch::Interpret;
                }
                match &self.worker {
                    Some(worker) => self.enqueue(worker, region, function, data_volume),
                    None => match self.core.compile_now(region, function, data_volume) {
                        Ok(handle) => Dispatch::Compiled(handle),
                        Err(err) => Dispatch::CompileFailed(err),
                    },
                }
            }
        }
    }

    fn enqueue(
        &self,
        worker: &CompileWorker,
        region: RegionId,
        function: &FunctionDescriptor,
        data_volume: usize,
    ) -> Dispatch {
        let job = CompileJob {
            region,
            function: function.clone(),
            data_volume,
        };
        let sent = worker
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(job).is_ok());
        if sent {
            debug!(region = %region, "compile job queued");
            Dispatch::Interpret
        } else {
            self.core.profiler.fail(region);
            self.core.record_failure(Duration::ZERO);
            Dispatch::CompileFailed(CompileError::WorkerUnavailable)
        }
    }

    /// Compile `function` for `region` now, or return the installed handle.
    ///
    /// Compiling an already compiled region returns the same handle.
    pub fn compile(
        &self,
        region: RegionId,
        function: &FunctionDescriptor,
        data_volume: usize,
    ) -> Result<Arc<CompiledRegion>, CompileError> {
        if let Some(handle) = self.core.profiler.handle(region) {
            self.core.stats.lock().cache_hits += 1;
            return Ok(handle);
        }
        if !self.core.profiler.force_hot(region) || !self.core.profiler.begin_compile(region) {
            return Err(CompileError::InProgress(region));
        }
        self.core.compile_now(region, function, data_volume)
    }

    /// Installed handle for `region`
    pub fn compiled(&self, region: RegionId) -> Option<Arc<CompiledRegion>> {
        self.core.profiler.handle(region)
    }

    /// Promotion state of `region`
    pub fn state(&self, region: RegionId) -> PromotionState {
        self.core.profiler.state(region)
    }

    /// Executions observed for `region`
    pub fn execution_count(&self, region: RegionId) -> u64 {
        self.core.profiler.count(region)
    }

    /// Profiles of every region seen
    pub fn regions(&self) -> Vec<RegionProfile> {
        self.core.profiler.snapshot()
    }

    /// Compiler statistics
    pub fn stats(&self) -> CompilerStats {
        self.core.stats.lock().clone()
    }

    /// Take failures from background compilations not yet reported
    pub fn drain_background_failures(&self) -> Vec<(RegionId, CompileError)> {
        std::mem::take(&mut *self.core.background_failures.lock())
    }
}

impl std::fmt::Debug for JitCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitCompiler")
            .field("config", &self.core.config)
            .field("gpu", &self.core.gpu_available())
            .field("background", &self.worker.is_some())
            .finish()
    }
}
