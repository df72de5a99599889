#![doc(issue_tracker_base_url = "https://github.com/factordynamics/forja/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and trait definitions for the Forja factor mining engine.
//!
//! This crate provides the foundational abstractions shared by every other
//! Forja crate: panel containers, dimension tags, the numeric operator
//! boundary and the common error type.

/// The version of the forja-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod dimension;
pub mod error;
pub mod operator;
pub mod stats;
pub mod types;

// Re-exports
pub use dimension::{Dimension, DimensionSet};
pub use error::{ForjaError, Result};
pub use operator::{Arg, ArgKind, Operator, OperatorCategory};
pub use types::{
    Aligned, AssetId, CLOSE_COLUMN, FactorPanel, Frame, Panel, RETURN_COLUMN, Timestamp,
    finite_fraction,
};
