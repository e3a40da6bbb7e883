//! Optimization passes over [`IrFunction`]
//!
//! Each pass rewrites the function in place and reports how many rewrites it
//! made. The pipeline order is fixed: unrolling first so the copies become
//! visible to the later passes, kernel outlining last and only for the GPU.

mod cse;
mod dce;
mod outline;
mod unroll;
mod vectorize;

pub use cse::CommonSubexpressionElimination;
pub use dce::DeadCodeElimination;
pub use outline::KernelOutlining;
pub use unroll::LoopUnrolling;
pub use vectorize::Vectorization;

use crate::backend::BackendTarget;
use crate::config::JitConfig;
use crate::ir::IrFunction;
use serde::Serialize;
use tracing::trace;

/// An IR-to-IR rewrite
pub trait Pass: Send + Sync {
    /// Name used in statistics
    fn name(&self) -> &'static str;

    /// Rewrite `ir`, returning the number of rewrites made
    fn run(&self, ir: &mut IrFunction) -> usize;
}

/// Rewrites made by one pass during one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Pass name
    pub pass: &'static str,
    /// Rewrites made
    pub rewrites: usize,
}

/// Ordered pass list for one backend target
pub struct PassPipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    /// Pipeline for `target` under `config`
    pub fn for_target(config: &JitConfig, target: BackendTarget) -> Self {
        let mut passes: Vec<Box<dyn Pass>> = Vec::new();
        if config.optimize {
            passes.push(Box::new(LoopUnrolling::new(
                config.unroll_factor,
                config.max_unroll_body,
            )));
            passes.push(Box::new(Vectorization));
            passes.push(Box::new(CommonSubexpressionElimination));
            passes.push(Box::new(DeadCodeElimination));
        }
        if target == BackendTarget::Gpu {
            passes.push(Box::new(KernelOutlining));
        }
        Self { passes }
    }

    /// Pass names in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass in order
    pub fn run(&self, ir: &mut IrFunction) -> Vec<PassReport> {
        self.passes
            .iter()
            .map(|pass| {
                let rewrites = pass.run(ir);
                trace!(function = %ir.name, pass = pass.name(), rewrites, "pass finished");
                PassReport {
                    pass: pass.name(),
                    rewrites,
                }
            })
            .collect()
    }
}
