//! Substitute-value recovery

use super::{RecoveryContext, RecoveryOutcome, RecoveryStrategy};
use core_types::Value;

/// Substitutes a default value for the failed operation
///
/// A value supplied with the request wins over the strategy's own default.
#[derive(Debug, Clone, Default)]
pub struct FallbackStrategy {
    default: Value,
}

impl FallbackStrategy {
    /// Strategy substituting `default` when the request supplies nothing
    pub fn new(default: Value) -> Self {
        Self { default }
    }
}

impl RecoveryStrategy for FallbackStrategy {
    fn name(&self) -> &str {
        "fallback"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let value = ctx.fallback.clone().unwrap_or_else(|| self.default.clone());
        RecoveryOutcome::succeeded(self.name(), format!("substituted {}", value)).with_value(value)
    }
}
