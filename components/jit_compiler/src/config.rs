//! JIT configuration

use serde::{Deserialize, Serialize};

/// Backend selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Always lower for the CPU
    Cpu,
    /// Always lower for the GPU; fails when no device is available
    Gpu,
    /// GPU for large data volumes when a device is available, else CPU
    #[default]
    Auto,
}

/// When promoted regions are compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilePolicy {
    /// Compile on the calling thread; the promoting call already runs compiled
    #[default]
    Synchronous,
    /// Compile on a worker thread; calls interpret until the handle is installed
    Background,
}

/// JIT compiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Master switch; when off every call interprets
    pub enabled: bool,
    /// A region is hot once its counter strictly exceeds this
    pub hot_threshold: u64,
    /// Backend selection
    pub backend: BackendMode,
    /// `Auto` picks the GPU when a call carries more scalars than this
    pub gpu_volume_threshold: usize,
    /// Synchronous or background compilation
    pub policy: CompilePolicy,
    /// Run the optimization passes
    pub optimize: bool,
    /// Copies of a loop body after unrolling; below 2 disables unrolling
    pub unroll_factor: usize,
    /// Largest loop body (in IR ops) considered for unrolling
    pub max_unroll_body: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_threshold: 100,
            backend: BackendMode::Auto,
            gpu_volume_threshold: 1024,
            policy: CompilePolicy::Synchronous,
            optimize: true,
            unroll_factor: 4,
            max_unroll_body: 32,
        }
    }
}
