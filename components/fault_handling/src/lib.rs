//! Fault classification, accounting and recovery
//!
//! Every exceptional condition in the runtime is funneled through a
//! [`FaultHandler`]. The handler turns a native fault or a bare code into an
//! immutable [`FaultRecord`], logs it at the level its severity selects,
//! counts it, and optionally runs a named [`RecoveryStrategy`] before
//! returning a structured [`FaultReport`].
//!
//! # Overview
//!
//! - [`FaultCatalog`] - Descriptors for every known code
//! - [`FaultRequest`] - Builder for a single `handle_fault` call
//! - [`FaultHandler`] - Counters, history, handlers and strategy registry
//! - [`recovery`] - Built-in strategies and the component registry
//!
//! # Examples
//!
//! ```
//! use core_types::{FaultCode, RuntimeFault};
//! use fault_handling::{FaultConfig, FaultHandler, FaultRequest};
//!
//! let handler = FaultHandler::new(FaultConfig::default());
//! let report = handler.handle_fault(FaultRequest::fault(RuntimeFault::DivisionByZero));
//!
//! assert_eq!(report.code(), FaultCode::DIVISION_BY_ZERO);
//! assert_eq!(handler.get_error_metrics().by_code[&FaultCode::DIVISION_BY_ZERO], 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod handler;
pub mod metrics;
pub mod record;
pub mod recovery;

pub use catalog::{FaultCatalog, FaultDescriptor};
pub use config::FaultConfig;
pub use handler::{ErrorHandlerFn, FaultHandler};
pub use metrics::{ErrorMetrics, RecoveryStats};
pub use record::{Disposition, FaultRecord, FaultReport, FaultRequest, Operation};
pub use recovery::{
    AttemptRecord, CircuitState, FnStrategy, ComponentRegistry, ComponentStatus, ManagedComponent,
    RecoveryContext, RecoveryOutcome, RecoveryStrategy, StrategyRegistry,
};
