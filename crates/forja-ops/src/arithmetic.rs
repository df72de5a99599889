//! Binary arithmetic between two series.
//!
//! Division is protected: denominators with magnitude below `1e-12` produce
//! NaN rather than infinities.

use crate::registry::BuiltinOperator;
use forja_traits::{Arg, ArgKind, DimensionSet, ForjaError, OperatorCategory, Result};
use ndarray::{Array2, ArrayView2, Zip};

const BINARY: &[ArgKind] = &[
    ArgKind::Series(DimensionSet::ALL),
    ArgKind::Series(DimensionSet::ALL),
];

/// Smallest denominator magnitude accepted by [`div`].
pub const DIV_EPSILON: f64 = 1e-12;

pub(crate) fn operators() -> Vec<BuiltinOperator> {
    vec![
        BuiltinOperator::new("add", OperatorCategory::Arithmetic, BINARY, "x + y", |a| {
            binary(a, "add", add)
        }),
        BuiltinOperator::new("sub", OperatorCategory::Arithmetic, BINARY, "x - y", |a| {
            binary(a, "sub", sub)
        }),
        BuiltinOperator::new("mul", OperatorCategory::Arithmetic, BINARY, "x * y", |a| {
            binary(a, "mul", mul)
        }),
        BuiltinOperator::new(
            "div",
            OperatorCategory::Arithmetic,
            BINARY,
            "x / y, NaN where |y| is ~0",
            |a| binary(a, "div", div),
        ),
    ]
}

fn binary(
    args: &[Arg<'_>],
    name: &str,
    f: fn(ArrayView2<'_, f64>, ArrayView2<'_, f64>) -> Result<Array2<f64>>,
) -> Result<Array2<f64>> {
    f(args[0].series(name, 0)?, args[1].series(name, 1)?)
}

fn zip_with(
    name: &str,
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Array2<f64>> {
    if x.dim() != y.dim() {
        return Err(ForjaError::ShapeMismatch(format!(
            "{name}: {:?} vs {:?}",
            x.dim(),
            y.dim()
        )));
    }
    Ok(Zip::from(&x).and(&y).map_collect(|&a, &b| f(a, b)))
}

/// Element-wise sum.
pub fn add(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    zip_with("add", x, y, |a, b| a + b)
}

/// Element-wise difference.
pub fn sub(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    zip_with("sub", x, y, |a, b| a - b)
}

/// Element-wise product.
pub fn mul(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    zip_with("mul", x, y, |a, b| a * b)
}

/// Protected element-wise quotient.
pub fn div(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    zip_with("div", x, y, |a, b| {
        if b.abs() < DIV_EPSILON { f64::NAN } else { a / b }
    })
}
