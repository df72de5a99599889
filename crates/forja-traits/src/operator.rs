//! Operator trait for the numeric building blocks of factor expressions.
//!
//! This module defines the `Operator` trait, the boundary between the
//! expression machinery and concrete numeric implementations. An operator
//! declares its argument kinds and maps evaluated arguments to a new
//! time × asset matrix of the same shape.

use crate::{DimensionSet, ForjaError, Result};
use derive_more::Display;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// How an operator traverses the panel.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorCategory {
    /// Binary arithmetic between two series.
    Arithmetic,
    /// Cell-by-cell transforms.
    Elementwise,
    /// Rolling computations down each asset column.
    TimeSeries,
    /// Computations across assets within each row.
    CrossSectional,
}

/// Declared kind of one operator argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A panel-shaped series whose dimension must be in the set.
    Series(DimensionSet),
    /// A rolling window length in rows.
    Window,
    /// A numeric constant.
    Constant,
}

/// An evaluated argument passed to [`Operator::apply`].
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    /// Panel-shaped values.
    Series(ArrayView2<'a, f64>),
    /// A window length.
    Window(usize),
    /// A numeric constant.
    Constant(f64),
}

impl<'a> Arg<'a> {
    /// Returns the series view, or an evaluation error naming the operator.
    pub fn series(&self, op: &str, position: usize) -> Result<ArrayView2<'a, f64>> {
        match self {
            Self::Series(view) => Ok(*view),
            other => Err(ForjaError::Evaluation(format!(
                "{op}: argument {position} must be a series, got {other:?}"
            ))),
        }
    }

    /// Returns the window length, or an evaluation error naming the operator.
    pub fn window(&self, op: &str, position: usize) -> Result<usize> {
        match self {
            Self::Window(w) if *w > 0 => Ok(*w),
            other => Err(ForjaError::Evaluation(format!(
                "{op}: argument {position} must be a positive window, got {other:?}"
            ))),
        }
    }

    /// Returns the constant, or an evaluation error naming the operator.
    pub fn constant(&self, op: &str, position: usize) -> Result<f64> {
        match self {
            Self::Constant(c) => Ok(*c),
            other => Err(ForjaError::Evaluation(format!(
                "{op}: argument {position} must be a constant, got {other:?}"
            ))),
        }
    }
}

/// A named numeric operator over panel matrices.
///
/// Implementations must be thread-safe (`Send + Sync`) because candidate
/// expressions are evaluated in parallel against a shared panel. `apply`
/// must not mutate its inputs and must return a matrix with the shape of its
/// series arguments.
///
/// # Example
///
/// ```
/// use forja_traits::{Arg, ArgKind, DimensionSet, Operator, OperatorCategory, Result};
/// use ndarray::Array2;
///
/// #[derive(Debug)]
/// struct Square;
///
/// impl Operator for Square {
///     fn name(&self) -> &str {
///         "square"
///     }
///
///     fn category(&self) -> OperatorCategory {
///         OperatorCategory::Elementwise
///     }
///
///     fn args(&self) -> &[ArgKind] {
///         &[ArgKind::Series(DimensionSet::NUMERIC)]
///     }
///
///     fn apply(&self, args: &[Arg<'_>]) -> Result<Array2<f64>> {
///         Ok(args[0].series(self.name(), 0)?.mapv(|v| v * v))
///     }
/// }
///
/// assert_eq!(Square.arity(), 1);
/// ```
pub trait Operator: Send + Sync + std::fmt::Debug {
    /// Returns the unique operator name used in expression text.
    fn name(&self) -> &str;

    /// Returns how the operator traverses the panel.
    fn category(&self) -> OperatorCategory;

    /// Returns the declared argument kinds, in order.
    fn args(&self) -> &[ArgKind];

    /// Returns the number of arguments.
    fn arity(&self) -> usize {
        self.args().len()
    }

    /// Computes the operator over evaluated arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument has the wrong kind or the series
    /// arguments disagree in shape.
    fn apply(&self, args: &[Arg<'_>]) -> Result<Array2<f64>>;
}
