//! The fault handler
//!
//! One `FaultHandler` is constructed per runtime and shared by `Arc` with
//! every component that can fault. Counters, history and registries live
//! behind `parking_lot` locks; no lock is held while a strategy or an error
//! handler runs.

use crate::catalog::{FaultCatalog, FaultDescriptor};
use crate::config::FaultConfig;
use crate::metrics::{ErrorMetrics, RecoveryStats, RECENT_RECORDS};
use crate::record::{Disposition, FaultRecord, FaultReport, FaultRequest};
use crate::recovery::{
    CircuitBreakerStrategy, ComponentRegistry, FnStrategy, RecoveryContext, RecoveryOutcome,
    RecoveryStrategy, StrategyRegistry,
};
use chrono::Utc;
use core_types::{FaultCategory, FaultCode, Severity};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Callback invoked for every fault with a given code
pub type ErrorHandlerFn = Arc<dyn Fn(&FaultRecord) + Send + Sync>;

#[derive(Default)]
struct Accounting {
    total: u64,
    by_code: BTreeMap<FaultCode, u64>,
    by_severity: BTreeMap<Severity, u64>,
    by_category: BTreeMap<FaultCategory, u64>,
    history: VecDeque<Arc<FaultRecord>>,
    recovery: RecoveryStats,
}

/// Classifies, logs, counts and optionally recovers from faults
pub struct FaultHandler {
    config: FaultConfig,
    catalog: RwLock<FaultCatalog>,
    strategies: RwLock<StrategyRegistry>,
    handlers: RwLock<HashMap<FaultCode, Vec<ErrorHandlerFn>>>,
    components: Arc<ComponentRegistry>,
    breaker: Arc<CircuitBreakerStrategy>,
    accounting: Mutex<Accounting>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for FaultHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultHandler")
            .field("config", &self.config)
            .field("total_faults", &self.total_faults())
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl FaultHandler {
    /// Handler with the default catalog and every built-in strategy
    pub fn new(config: FaultConfig) -> Self {
        let components = Arc::new(ComponentRegistry::new());
        let breaker = Arc::new(CircuitBreakerStrategy::new(
            config.circuit_failure_threshold,
            config.circuit_reset_timeout(),
        ));
        let strategies = StrategyRegistry::with_builtins(components.clone(), breaker.clone());
        Self {
            config,
            catalog: RwLock::new(FaultCatalog::default()),
            strategies: RwLock::new(strategies),
            handlers: RwLock::new(HashMap::new()),
            components,
            breaker,
            accounting: Mutex::new(Accounting::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Components targeted by the reset, isolate_restart and degrade strategies
    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// The built-in circuit breaker, for state queries and manual reset
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreakerStrategy> {
        &self.breaker
    }

    /// Add or replace a catalog entry
    pub fn register_fault_code(&self, descriptor: FaultDescriptor) {
        self.catalog.write().register(descriptor);
    }

    /// Catalog descriptor for `code`
    pub fn describe(&self, code: FaultCode) -> FaultDescriptor {
        self.catalog.read().describe(code)
    }

    /// Add or replace a strategy under its own name
    pub fn register_recovery_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.write().register(strategy);
    }

    /// Register a closure as a strategy named `name`
    pub fn register_recovery_fn<F>(&self, name: &str, f: F)
    where
        F: Fn(&mut RecoveryContext<'_>) -> RecoveryOutcome + Send + Sync + 'static,
    {
        self.register_recovery_strategy(Arc::new(FnStrategy::new(name, f)));
    }

    /// Names of registered strategies
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.read().names()
    }

    /// Invoke `handler` for every fault recorded with `code`
    pub fn register_error_handler<F>(&self, code: FaultCode, handler: F)
    where
        F: Fn(&FaultRecord) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(code)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Record a fault and optionally recover from it.
    ///
    /// Increments the per-code, per-severity and per-category counters by
    /// exactly one and appends to the capped history.
    pub fn handle_fault(&self, mut request: FaultRequest) -> FaultReport {
        let code = request.resolved_code();
        let descriptor = self.describe(code);
        let severity = request.severity.unwrap_or(descriptor.default_severity);
        let category = request.category.unwrap_or_else(|| code.category());
        let message = request
            .message
            .take()
            .or_else(|| request.native_message())
            .unwrap_or_else(|| descriptor.name.replace('_', " "));

        let record = Arc::new(FaultRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            code,
            name: descriptor.name.clone(),
            message,
            severity,
            category,
            context: std::mem::take(&mut request.context),
            timestamp: Utc::now(),
            trace: std::mem::take(&mut request.trace),
        });

        log_record(&record);
        self.account(&record);
        self.notify(&record);

        let disposition = if descriptor.recoverable {
            Disposition::Recoverable
        } else {
            Disposition::Propagate
        };

        let recovery = if request.auto_recover && descriptor.recoverable {
            let strategy = request
                .strategy
                .clone()
                .or_else(|| descriptor.default_strategy.clone());
            strategy.map(|name| self.recover(&record, &name, &mut request))
        } else {
            None
        };

        FaultReport {
            record,
            recovery,
            disposition,
        }
    }

    /// Convert a native fault and handle it without recovery
    pub fn report(&self, fault: core_types::RuntimeFault) -> FaultReport {
        self.handle_fault(FaultRequest::fault(fault))
    }

    fn recover(&self, record: &FaultRecord, name: &str, request: &mut FaultRequest) -> RecoveryOutcome {
        let strategy = self.strategies.read().get(name);
        let outcome = match strategy {
            Some(strategy) => {
                let mut ctx = RecoveryContext::new(
                    record,
                    self.config.max_attempts,
                    self.config.recovery_deadline(),
                )
                .with_backoff(self.config.base_backoff(), self.config.max_backoff())
                .with_fallback(request.fallback.take());
                if let Some(operation) = request.operation.as_deref_mut() {
                    ctx = ctx.with_operation(operation);
                }
                strategy.recover(&mut ctx)
            }
            None => RecoveryOutcome {
                attempts: 0,
                ..RecoveryOutcome::failed(name, format!("no recovery strategy named '{}'", name))
            },
        };

        if outcome.success {
            info!(code = %record.code, strategy = name, attempts = outcome.attempts, "recovered");
        } else {
            warn!(code = %record.code, strategy = name, attempts = outcome.attempts, message = %outcome.message, "recovery failed");
        }

        let mut accounting = self.accounting.lock();
        let stats = &mut accounting.recovery;
        stats.attempted += 1;
        if outcome.success {
            stats.succeeded += 1;
        } else {
            stats.failed += 1;
        }
        stats.total_time += outcome.elapsed;
        *stats.by_strategy.entry(name.to_string()).or_insert(0) += 1;
        outcome
    }

    fn account(&self, record: &Arc<FaultRecord>) {
        let mut accounting = self.accounting.lock();
        accounting.total += 1;
        *accounting.by_code.entry(record.code).or_insert(0) += 1;
        *accounting.by_severity.entry(record.severity).or_insert(0) += 1;
        *accounting.by_category.entry(record.category).or_insert(0) += 1;
        if self.config.history_capacity > 0 {
            while accounting.history.len() >= self.config.history_capacity {
                accounting.history.pop_front();
            }
            accounting.history.push_back(record.clone());
        }
    }

    fn notify(&self, record: &FaultRecord) {
        let handlers = self.handlers.read().get(&record.code).cloned();
        for handler in handlers.into_iter().flatten() {
            handler(record);
        }
    }

    /// Counters, recent history and recovery statistics
    pub fn get_error_metrics(&self) -> ErrorMetrics {
        let accounting = self.accounting.lock();
        let skip = accounting.history.len().saturating_sub(RECENT_RECORDS);
        ErrorMetrics {
            total: accounting.total,
            by_code: accounting.by_code.clone(),
            by_severity: accounting.by_severity.clone(),
            by_category: accounting.by_category.clone(),
            history_len: accounting.history.len(),
            recent: accounting
                .history
                .iter()
                .skip(skip)
                .map(|r| (**r).clone())
                .collect(),
            recovery: accounting.recovery.clone(),
        }
    }

    /// Retained records, oldest first
    pub fn history(&self) -> Vec<Arc<FaultRecord>> {
        self.accounting.lock().history.iter().cloned().collect()
    }

    /// Total faults handled since the last clear
    pub fn total_faults(&self) -> u64 {
        self.accounting.lock().total
    }

    /// Drop all history and zero every counter
    pub fn clear_error_history(&self) {
        *self.accounting.lock() = Accounting::default();
        info!("fault history cleared");
    }
}

impl Default for FaultHandler {
    fn default() -> Self {
        Self::new(FaultConfig::default())
    }
}

fn log_record(record: &FaultRecord) {
    let code = record.code.raw();
    let category = record.category.as_str();
    match record.severity {
        Severity::Low => info!(code, category, name = %record.name, "{}", record.message),
        Severity::Medium => warn!(code, category, name = %record.name, "{}", record.message),
        Severity::High => error!(code, category, name = %record.name, "{}", record.message),
        Severity::Critical => {
            error!(code, category, name = %record.name, critical = true, "{}", record.message)
        }
    }
}
