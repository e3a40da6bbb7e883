//! Core value types and the coded fault taxonomy.
//!
//! This crate provides the vocabulary shared by every runtime component:
//! the dynamic value representation, the arithmetic both the interpreter and
//! compiled code must agree on, the numeric fault bands, and the identifiers
//! used to profile hot regions.
//!
//! # Overview
//!
//! - [`Value`] - Dynamically typed runtime value
//! - [`ops`] - Binary, unary and comparison semantics
//! - [`FaultCode`] / [`FaultCategory`] / [`Severity`] - The coded taxonomy
//! - [`RuntimeFault`] - Native-level faults and their deterministic codes
//! - [`RegionId`] / [`PromotionState`] - Hot-path profiling identifiers
//!
//! # Examples
//!
//! ```
//! use core_types::{FaultCategory, FaultCode, RuntimeFault, Value};
//!
//! let sum = core_types::ops::binary(core_types::BinaryOp::Add, &Value::Int(2), &Value::Int(3));
//! assert_eq!(sum.unwrap(), Value::Int(5));
//!
//! let fault = RuntimeFault::DivisionByZero;
//! assert_eq!(fault.code(), FaultCode::DIVISION_BY_ZERO);
//! assert_eq!(fault.code().category(), FaultCategory::Execution);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
pub mod ops;
mod profile;
mod value;

pub use error::{FaultCategory, FaultCode, RuntimeFault, Severity};
pub use ops::{BinaryOp, CompareOp};
pub use profile::{PromotionState, RegionId};
pub use value::Value;
