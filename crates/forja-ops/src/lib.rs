//! Operator implementations for Forja factor expressions.
//!
//! This crate provides the numeric operators that expression trees are built
//! from, across four categories:
//! - Arithmetic: protected add, sub, mul, div
//! - Element-wise: abs, neg, log, sqrt, sign, exp, tanh, sigmoid, clip, sanitize
//! - Time-series: rolling aggregates, lags, z-scores, ranks, correlation
//! - Cross-sectional: rank, z-score and demean across assets
//!
//! Every operator maps time × asset matrices to a matrix of the same shape and
//! never mutates its inputs.
//!
//! # Example
//!
//! ```
//! use forja_ops::OperatorLibrary;
//! use forja_traits::{Arg, Operator};
//! use ndarray::array;
//!
//! let library = OperatorLibrary::with_defaults();
//! let ts_mean = library.get("ts_mean").unwrap();
//!
//! let close = array![[1.0], [2.0], [3.0]];
//! let out = ts_mean.apply(&[Arg::Series(close.view()), Arg::Window(2)]).unwrap();
//! assert_eq!(out[[2, 0]], 2.5);
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod arithmetic;
pub mod cross_sectional;
pub mod elementwise;
pub mod registry;
pub mod time_series;

// Re-export key types
pub use registry::{
    BuiltinOperator, OperatorFn, OperatorInfo, OperatorLibrary, available_operators,
    get_operator_info,
};
