//! Profiling identifiers for hot-path promotion
//!
//! This module is placed in core_types so that the interpreter (which assigns
//! region ids at function registration) and jit_compiler (which drives the
//! promotion state machine) agree on the vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a profiled code region.
///
/// Assigned explicitly when a function is registered, never derived from
/// object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Promotion state of a region
///
/// ```text
/// Unprofiled --(count > threshold)--> Hot --> Compiling --> Compiled
///                                              |
///                                              +--> CompileFailed --> Unprofiled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionState {
    /// Interpreted, counting executions
    Unprofiled,
    /// Counter crossed the threshold, compilation pending
    Hot,
    /// Compilation in progress
    Compiling,
    /// Compiled handle installed
    Compiled,
    /// Last compilation failed; reverts to `Unprofiled`
    CompileFailed,
}

impl PromotionState {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: PromotionState) -> bool {
        use PromotionState::*;
        matches!(
            (self, next),
            (Unprofiled, Hot)
                | (Hot, Compiling)
                | (Compiling, Compiled)
                | (Compiling, CompileFailed)
                | (CompileFailed, Unprofiled)
        )
    }

    /// Whether dispatch should use the compiled handle.
    pub fn is_compiled(self) -> bool {
        self == PromotionState::Compiled
    }
}
