//! Evaluation of expression trees against a [`Panel`].
//!
//! Trees are interpreted bottom-up. Columns resolve to panel matrices,
//! windows and constants are passed to operators as plain numbers, and a
//! constant in a series slot is broadcast to the panel shape.
//!
//! With `normalize` set, the raw output goes through the same pipeline the
//! registry stores as text, `sanitize(clip(ts_zscore(sanitize(x), W), C))`:
//! non-finite cells become zero, each asset is z-scored over a rolling window
//! of `W` rows, values are clipped to `[-C, C]` and any remaining gaps are
//! zero-filled.

use crate::dimension::DimensionTracker;
use crate::primitives::infer_dimension;
use crate::tree::{Expr, Node, NodeId};
use forja_ops::OperatorLibrary;
use forja_ops::elementwise::{clip, sanitize};
use forja_ops::time_series::ts_zscore;
use forja_traits::{
    Arg, ArgKind, FactorPanel, ForjaError, Panel, Result, finite_fraction,
};
use ndarray::{Array2, ArrayView2};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// Intermediate value of a subtree.
#[derive(Debug)]
enum Value {
    Series(Array2<f64>),
    Window(usize),
    Constant(f64),
}

/// Interprets expressions over panels.
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    library: OperatorLibrary,
    tracker: Option<DimensionTracker>,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new(OperatorLibrary::with_defaults())
    }
}

impl ExpressionEvaluator {
    /// Evaluator over the given operators, without dimension checks.
    pub const fn new(library: OperatorLibrary) -> Self {
        Self {
            library,
            tracker: None,
        }
    }

    /// Rejects expressions whose dimensions do not compose before evaluating.
    #[must_use]
    pub fn with_tracker(mut self, tracker: DimensionTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// The operators this evaluator resolves names against.
    pub const fn library(&self) -> &OperatorLibrary {
        &self.library
    }

    /// Evaluates `expr` over `panel`.
    ///
    /// `raw_coverage` of the result is the finite fraction of the raw output,
    /// before normalization fills gaps.
    ///
    /// # Errors
    ///
    /// Fails for unknown columns or operators, arity and argument-kind
    /// mismatches, rejected dimensions, invalid normalization settings, an
    /// output without any finite value, and panics inside operator code.
    pub fn evaluate(
        &self,
        expr: &Expr,
        panel: &Panel,
        normalize: bool,
        zscore_window: usize,
        clip_range: f64,
    ) -> Result<FactorPanel> {
        if normalize {
            if zscore_window == 0 {
                return Err(ForjaError::InvalidConfig("zscore window must be positive".into()));
            }
            if !clip_range.is_finite() || clip_range <= 0.0 {
                return Err(ForjaError::InvalidConfig(format!(
                    "clip range must be positive and finite, got {clip_range}"
                )));
            }
        }

        let raw = self.evaluate_raw(expr, panel)?;
        let raw_coverage = finite_fraction(&raw);
        if raw_coverage == 0.0 {
            return Err(ForjaError::Evaluation(format!(
                "{expr} produced no finite values"
            )));
        }

        let values = if normalize {
            normalize_values(raw.view(), zscore_window, clip_range)
        } else {
            raw
        };
        Ok(FactorPanel::new(panel.frame_of(values), raw_coverage))
    }

    /// Like [`Self::evaluate`], but any failure means "no valid factor".
    pub fn evaluate_or_none(
        &self,
        expr: &Expr,
        panel: &Panel,
        normalize: bool,
        zscore_window: usize,
        clip_range: f64,
    ) -> Option<FactorPanel> {
        match self.evaluate(expr, panel, normalize, zscore_window, clip_range) {
            Ok(factor) => Some(factor),
            Err(e) => {
                debug!(expression = %expr, error = %e, "evaluation failed");
                None
            }
        }
    }

    /// Raw panel-shaped output of `expr`, without post-processing.
    pub fn evaluate_raw(&self, expr: &Expr, panel: &Panel) -> Result<Array2<f64>> {
        if let Some(tracker) = &self.tracker {
            infer_dimension(expr, &self.library, tracker)?;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.eval_node(expr, expr.root(), panel)));
        let value = match outcome {
            Ok(value) => value?,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                return Err(ForjaError::Evaluation(format!(
                    "{expr} panicked: {message}"
                )));
            }
        };

        match value {
            Value::Series(values) => Ok(values),
            Value::Constant(c) => Ok(Array2::from_elem(panel.shape(), c)),
            Value::Window(w) => Err(ForjaError::Evaluation(format!(
                "expression is a bare window ({w})"
            ))),
        }
    }

    fn eval_node(&self, expr: &Expr, id: NodeId, panel: &Panel) -> Result<Value> {
        match expr.node(id) {
            Node::Column(name) => panel
                .column(name)
                .cloned()
                .map(Value::Series)
                .ok_or_else(|| ForjaError::UnknownColumn(name.clone())),
            Node::Constant(c) => Ok(Value::Constant(*c)),
            Node::Window(w) => Ok(Value::Window(*w)),
            Node::Operator { name, children } => {
                let op = self
                    .library
                    .get(name)
                    .ok_or_else(|| ForjaError::UnknownOperator(name.clone()))?;
                let kinds = op.args();
                if kinds.len() != children.len() {
                    return Err(ForjaError::Arity {
                        name: name.clone(),
                        expected: kinds.len(),
                        actual: children.len(),
                    });
                }

                let values = children
                    .iter()
                    .map(|&child| self.eval_node(expr, child, panel))
                    .collect::<Result<Vec<_>>>()?;

                // Constants in series slots are broadcast before borrowing.
                let broadcast: Vec<Option<Array2<f64>>> = values
                    .iter()
                    .zip(kinds)
                    .map(|(value, kind)| match (value, kind) {
                        (Value::Constant(c), ArgKind::Series(_)) => {
                            Some(Array2::from_elem(panel.shape(), *c))
                        }
                        _ => None,
                    })
                    .collect();

                let args = values
                    .iter()
                    .zip(&broadcast)
                    .zip(kinds)
                    .enumerate()
                    .map(|(position, ((value, filled), kind))| {
                        to_arg(name, position, value, filled.as_ref(), *kind)
                    })
                    .collect::<Result<Vec<_>>>()?;

                let out = op.apply(&args)?;
                if out.dim() != panel.shape() {
                    return Err(ForjaError::ShapeMismatch(format!(
                        "{name} returned {:?}, panel is {:?}",
                        out.dim(),
                        panel.shape()
                    )));
                }
                Ok(Value::Series(out))
            }
        }
    }
}

fn to_arg<'a>(
    op: &str,
    position: usize,
    value: &'a Value,
    broadcast: Option<&'a Array2<f64>>,
    kind: ArgKind,
) -> Result<Arg<'a>> {
    match (kind, value) {
        (ArgKind::Series(_), Value::Series(values)) => Ok(Arg::Series(values.view())),
        (ArgKind::Series(_), Value::Constant(_)) => broadcast
            .map(|values| Arg::Series(values.view()))
            .ok_or_else(|| ForjaError::Evaluation(format!("{op}: constant not broadcast"))),
        (ArgKind::Window, Value::Window(w)) => Ok(Arg::Window(*w)),
        (ArgKind::Constant, Value::Constant(c)) => Ok(Arg::Constant(*c)),
        (ArgKind::Constant, Value::Window(w)) => Ok(Arg::Constant(*w as f64)),
        (kind, value) => Err(ForjaError::Evaluation(format!(
            "{op}: argument {position} expects {kind:?}, got {}",
            match value {
                Value::Series(_) => "a series",
                Value::Window(_) => "a window",
                Value::Constant(_) => "a constant",
            }
        ))),
    }
}

/// Post-processing applied to normalized factors.
///
/// The output has no NaN or infinity and lies in `[-clip_range, clip_range]`.
pub fn normalize_values(raw: ArrayView2<'_, f64>, zscore_window: usize, clip_range: f64) -> Array2<f64> {
    let filled = sanitize(raw);
    let scored = ts_zscore(filled.view(), zscore_window);
    let clipped = clip(scored.view(), clip_range);
    sanitize(clipped.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expr;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use forja_traits::Timestamp;

    fn index(n: usize) -> Vec<Timestamp> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + chrono::Duration::hours(i as i64)).collect()
    }

    fn panel(rows: usize) -> Panel {
        let close = Array2::from_shape_fn((rows, 3), |(t, j)| {
            100.0 + (j as f64 + 1.0) * t as f64 + ((t * 7 + j * 3) % 5) as f64
        });
        let volume = Array2::from_shape_fn((rows, 3), |(t, j)| {
            if t == 4 && j == 1 {
                f64::NAN
            } else {
                1_000.0 + ((t * 13 + j) % 17) as f64
            }
        });
        let returns = Array2::from_shape_fn((rows, 3), |(t, j)| {
            if t == 0 {
                f64::NAN
            } else {
                close[[t, j]] / close[[t - 1, j]] - 1.0
            }
        });
        Panel::new(index(rows), vec!["AAA".into(), "BBB".into(), "CCC".into()])
            .unwrap()
            .with_column("Close", close)
            .unwrap()
            .with_column("Volume", volume)
            .unwrap()
            .with_column("return", returns)
            .unwrap()
    }

    #[test]
    fn test_raw_close_is_identity() {
        let panel = panel(30);
        let evaluator = ExpressionEvaluator::default();
        let factor = evaluator
            .evaluate(&parse_expr("Close").unwrap(), &panel, false, 20, 3.0)
            .unwrap();
        assert_eq!(factor.frame().values(), panel.column("Close").unwrap());
        assert_eq!(factor.raw_coverage(), 1.0);
    }

    #[test]
    fn test_normalized_output_is_bounded() {
        let panel = panel(80);
        let evaluator = ExpressionEvaluator::default();
        for text in [
            "div(Close, Volume)",
            "ts_delta(Close, 3)",
            "mul(cs_rank(Volume), exp(ts_zscore(Close, 5)))",
            "ts_pct_change(Volume, 5)",
        ] {
            let factor = evaluator
                .evaluate(&parse_expr(text).unwrap(), &panel, true, 20, 3.0)
                .unwrap();
            for v in factor.frame().values() {
                assert!(v.is_finite(), "{text}");
                assert!(v.abs() <= 3.0, "{text}: {v}");
            }
            assert!(factor.raw_coverage() > 0.0 && factor.raw_coverage() <= 1.0);
        }
    }

    #[test]
    fn test_raw_coverage_counts_before_fill() {
        let panel = panel(30);
        let evaluator = ExpressionEvaluator::default();
        let factor = evaluator
            .evaluate(&parse_expr("ts_mean(Close, 10)").unwrap(), &panel, true, 20, 3.0)
            .unwrap();
        assert_abs_diff_eq!(factor.raw_coverage(), 21.0 / 30.0, epsilon = 1e-12);
        assert_eq!(factor.frame().finite_fraction(), 1.0);
    }

    #[test]
    fn test_full_expression_matches_normalized_pipeline() {
        let panel = panel(60);
        let evaluator = ExpressionEvaluator::default();
        let inner = parse_expr("ts_delta(div(Close, Volume), 3)").unwrap();
        let full = parse_expr(&format!("sanitize(clip(ts_zscore(sanitize({inner}), 20), 3.0))"))
            .unwrap();

        let normalized = evaluator.evaluate(&inner, &panel, true, 20, 3.0).unwrap();
        let direct = evaluator.evaluate(&full, &panel, false, 20, 3.0).unwrap();
        assert_eq!(normalized.frame().values(), direct.frame().values());
    }

    #[test]
    fn test_unknown_column_fails() {
        let panel = panel(10);
        let evaluator = ExpressionEvaluator::default();
        let err = evaluator
            .evaluate(&parse_expr("ts_mean(Funding, 5)").unwrap(), &panel, true, 20, 3.0)
            .unwrap_err();
        assert!(matches!(err, ForjaError::UnknownColumn(c) if c == "Funding"));
        assert!(
            evaluator
                .evaluate_or_none(&parse_expr("Funding").unwrap(), &panel, true, 20, 3.0)
                .is_none()
        );
    }

    #[test]
    fn test_labels_are_not_columns() {
        let panel = panel(10)
            .with_label("fwd_return", Array2::zeros((10, 3)))
            .unwrap();
        let evaluator = ExpressionEvaluator::default();
        assert!(
            evaluator
                .evaluate(&parse_expr("fwd_return").unwrap(), &panel, false, 20, 3.0)
                .is_err()
        );
    }

    #[test]
    fn test_constants_broadcast() {
        let panel = panel(10);
        let evaluator = ExpressionEvaluator::default();
        let factor = evaluator
            .evaluate(&parse_expr("mul(Close, 2.0)").unwrap(), &panel, false, 20, 3.0)
            .unwrap();
        assert_eq!(factor.frame().values()[[3, 2]], 2.0 * panel.column("Close").unwrap()[[3, 2]]);
    }

    #[test]
    fn test_evaluation_errors() {
        let panel = panel(10);
        let evaluator = ExpressionEvaluator::default();
        let cases = [
            "frobnicate(Close)",
            "ts_mean(Close)",
            "ts_mean(Close, Volume)",
            "ts_mean(Close, 0)",
            "5",
        ];
        for text in cases {
            assert!(
                evaluator
                    .evaluate(&parse_expr(text).unwrap(), &panel, false, 20, 3.0)
                    .is_err(),
                "{text}"
            );
        }
        // zero window and clip are configuration errors
        let close = parse_expr("Close").unwrap();
        assert!(evaluator.evaluate(&close, &panel, true, 0, 3.0).is_err());
        assert!(evaluator.evaluate(&close, &panel, true, 20, 0.0).is_err());
    }

    #[test]
    fn test_all_nan_output_fails() {
        let panel = panel(10);
        let evaluator = ExpressionEvaluator::default();
        let err = evaluator
            .evaluate(&parse_expr("ts_mean(Close, 60)").unwrap(), &panel, true, 20, 3.0)
            .unwrap_err();
        assert!(matches!(err, ForjaError::Evaluation(_)));
    }

    #[test]
    fn test_tracker_rejects_dimension_mismatch() {
        let panel = panel(10);
        let evaluator = ExpressionEvaluator::default().with_tracker(DimensionTracker::default());
        let err = evaluator
            .evaluate(&parse_expr("add(Close, Volume)").unwrap(), &panel, false, 20, 3.0)
            .unwrap_err();
        assert!(matches!(err, ForjaError::DimensionMismatch(_)));
    }
}
