//! Cell-by-cell transforms.
//!
//! `log` and `sqrt` are sign-preserving so that they are defined on the whole
//! real line; `sanitize` replaces every non-finite cell with zero.

use crate::registry::BuiltinOperator;
use forja_traits::{Arg, ArgKind, DimensionSet, OperatorCategory, Result};
use ndarray::{Array2, ArrayView2};

const UNARY: &[ArgKind] = &[ArgKind::Series(DimensionSet::NUMERIC)];
const UNARY_ANY: &[ArgKind] = &[ArgKind::Series(DimensionSet::ALL)];
const CLIP: &[ArgKind] = &[ArgKind::Series(DimensionSet::ALL), ArgKind::Constant];

pub(crate) fn operators() -> Vec<BuiltinOperator> {
    vec![
        BuiltinOperator::new("abs", OperatorCategory::Elementwise, UNARY, "|x|", |a| {
            Ok(abs(a[0].series("abs", 0)?))
        }),
        BuiltinOperator::new(
            "neg",
            OperatorCategory::Elementwise,
            UNARY_ANY,
            "-x",
            |a| Ok(neg(a[0].series("neg", 0)?)),
        ),
        BuiltinOperator::new(
            "log",
            OperatorCategory::Elementwise,
            UNARY,
            "sign(x) * ln(1 + |x|)",
            |a| Ok(log(a[0].series("log", 0)?)),
        ),
        BuiltinOperator::new(
            "sqrt",
            OperatorCategory::Elementwise,
            UNARY,
            "sign(x) * sqrt(|x|)",
            |a| Ok(sqrt(a[0].series("sqrt", 0)?)),
        ),
        BuiltinOperator::new("sign", OperatorCategory::Elementwise, UNARY, "sign of x", |a| {
            Ok(sign(a[0].series("sign", 0)?))
        }),
        BuiltinOperator::new(
            "exp",
            OperatorCategory::Elementwise,
            UNARY,
            "e^x, input capped at 50",
            |a| Ok(exp(a[0].series("exp", 0)?)),
        ),
        BuiltinOperator::new(
            "tanh",
            OperatorCategory::Elementwise,
            UNARY,
            "hyperbolic tangent",
            |a| Ok(tanh(a[0].series("tanh", 0)?)),
        ),
        BuiltinOperator::new(
            "sigmoid",
            OperatorCategory::Elementwise,
            UNARY,
            "logistic function",
            |a| Ok(sigmoid(a[0].series("sigmoid", 0)?)),
        ),
        BuiltinOperator::new(
            "clip",
            OperatorCategory::Elementwise,
            CLIP,
            "clamp x to [-|c|, |c|]",
            |a| Ok(clip(a[0].series("clip", 0)?, a[1].constant("clip", 1)?)),
        ),
        BuiltinOperator::new(
            "sanitize",
            OperatorCategory::Elementwise,
            UNARY_ANY,
            "replace NaN and infinities with 0",
            |a| Ok(sanitize(a[0].series("sanitize", 0)?)),
        ),
    ]
}

/// Absolute value.
pub fn abs(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(f64::abs)
}

/// Negation.
pub fn neg(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| -v)
}

/// Sign-preserving logarithm `sign(x) * ln(1 + |x|)`.
pub fn log(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| v.signum() * v.abs().ln_1p())
}

/// Sign-preserving square root.
pub fn sqrt(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| v.signum() * v.abs().sqrt())
}

/// Sign: -1, 0 or 1 (NaN stays NaN).
pub fn sign(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| {
        if v.is_nan() {
            f64::NAN
        } else if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }
    })
}

/// Exponential with the input capped at 50.
pub fn exp(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| v.min(50.0).exp())
}

/// Hyperbolic tangent.
pub fn tanh(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(f64::tanh)
}

/// Logistic function.
pub fn sigmoid(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Clamp to `[-|bound|, |bound|]`; NaN stays NaN.
pub fn clip(x: ArrayView2<'_, f64>, bound: f64) -> Array2<f64> {
    let bound = bound.abs();
    x.mapv(|v| v.clamp(-bound, bound))
}

/// Replace NaN and ±infinity with zero.
pub fn sanitize(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| if v.is_finite() { v } else { 0.0 })
}
