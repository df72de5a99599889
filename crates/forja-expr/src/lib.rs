#![doc(issue_tracker_base_url = "https://github.com/factordynamics/forja/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Typed expression trees for Forja.
//!
//! - [`dimension`]: physical dimensions of operator outputs
//! - [`primitives`]: the operators and terminals a run may use
//! - [`tree`] and [`parse`]: the expression tree and its text form
//! - [`generate`]: random type-safe trees
//! - [`evaluator`]: panel evaluation and normalization
//!
//! # Example
//!
//! ```
//! use forja_expr::{DimensionTracker, build_registry, parse_expr};
//! use forja_traits::Dimension;
//!
//! let primitives = build_registry(&["Close", "Volume", "return"], true, true).unwrap();
//! let tracker = DimensionTracker::default();
//!
//! let expr = parse_expr("mul(Close, Volume)").unwrap();
//! assert_eq!(primitives.typecheck(&expr, &tracker).unwrap(), Dimension::QuoteVolume);
//! assert_eq!(expr.to_string(), "mul(Close, Volume)");
//! ```

pub mod dimension;
pub mod evaluator;
pub mod generate;
pub mod parse;
pub mod primitives;
pub mod tree;

pub use dimension::{
    BinaryCheck, BinaryOp, DimensionRule, DimensionTracker, Resolution, dimension_for_column,
};
pub use evaluator::{ExpressionEvaluator, normalize_values};
pub use generate::{GrowMethod, TreeGenerator};
pub use parse::parse_expr;
pub use primitives::{
    DEFAULT_CONSTANTS, DEFAULT_WINDOWS, Primitive, PrimitiveSet, RegistryOptions, Terminal,
    build_registry, infer_dimension, is_label_column,
};
pub use tree::{Expr, Node, NodeId, NodeKind};
