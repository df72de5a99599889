//! Fitness functions over expression trees.

use forja_eval::{FitnessEvaluator, FitnessResult};
use forja_expr::{ExpressionEvaluator, Expr, Node, NodeId, parse_expr};
use forja_traits::{ForjaError, Frame, Panel, RETURN_COLUMN, Result};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Scores expression trees.
///
/// Implementations are shared across the rayon pool and must never panic
/// or fail: problems are reported as invalid results.
pub trait FitnessFunction: Send + Sync {
    /// Scores one expression.
    fn evaluate(&self, expr: &Expr) -> FitnessResult;

    /// Fitness assigned to expressions that cannot be scored.
    fn floor(&self) -> f64;
}

/// Chooses the rolling z-score window for an inner expression.
pub type WindowFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Post-processing applied to candidate outputs before scoring.
#[derive(Clone)]
pub struct Normalization {
    /// Clip bound after z-scoring.
    pub clip_range: f64,
    /// Window for each inner expression.
    pub window: WindowFn,
}

impl fmt::Debug for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalization")
            .field("clip_range", &self.clip_range)
            .finish_non_exhaustive()
    }
}

impl Normalization {
    /// The same window for every expression.
    pub fn fixed(window: usize, clip_range: f64) -> Self {
        Self {
            clip_range,
            window: Arc::new(move |_| window),
        }
    }

    /// Splits `sanitize(clip(ts_zscore(sanitize(inner), W), C))` into the
    /// inner expression, `W` and `C`.
    ///
    /// Returns `None` when `full` is not shaped like the wrapper.
    pub fn strip(full: &Expr) -> Option<(Expr, usize, f64)> {
        let &[clipped] = operator_args(full, full.root(), "sanitize")? else {
            return None;
        };
        let &[standardized, bound] = operator_args(full, clipped, "clip")? else {
            return None;
        };
        let &[sanitized, window] = operator_args(full, standardized, "ts_zscore")? else {
            return None;
        };
        let &[inner] = operator_args(full, sanitized, "sanitize")? else {
            return None;
        };
        let &Node::Constant(clip_range) = full.node(bound) else {
            return None;
        };
        let &Node::Window(window) = full.node(window) else {
            return None;
        };
        Some((full.subtree(inner), window, clip_range))
    }
}

fn operator_args<'a>(expr: &'a Expr, id: NodeId, expected: &str) -> Option<&'a [NodeId]> {
    match expr.node(id) {
        Node::Operator { name, children } if name == expected => Some(children.as_slice()),
        _ => None,
    }
}

/// Evaluates expressions over a shared panel and scores the result against
/// forward returns.
#[derive(Debug, Clone)]
pub struct FactorFitness {
    panel: Arc<Panel>,
    returns: Frame,
    label: Option<Frame>,
    evaluator: ExpressionEvaluator,
    fitness: FitnessEvaluator,
    normalization: Option<Normalization>,
}

impl FactorFitness {
    /// Scores against `return` shifted one period forward, normalizing
    /// outputs with a fixed 20-row window and a clip of 3.
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::MissingColumn`] when the panel has no `return`.
    pub fn new(panel: Arc<Panel>, fitness: FitnessEvaluator) -> Result<Self> {
        let returns = panel
            .column_frame(RETURN_COLUMN)
            .ok_or_else(|| ForjaError::MissingColumn(RETURN_COLUMN.to_string()))?;
        Ok(Self {
            panel,
            returns,
            label: None,
            evaluator: ExpressionEvaluator::default(),
            fitness,
            normalization: Some(Normalization::fixed(20, 3.0)),
        })
    }

    /// Scores against an explicit label column of the panel.
    pub fn with_label(mut self, name: &str) -> Result<Self> {
        let label = self
            .panel
            .label_frame(name)
            .ok_or_else(|| ForjaError::MissingColumn(name.to_string()))?;
        self.label = Some(label);
        Ok(self)
    }

    /// Replaces the output post-processing; `None` scores raw outputs.
    #[must_use]
    pub fn with_normalization(mut self, normalization: Option<Normalization>) -> Self {
        self.normalization = normalization;
        self
    }

    /// Replaces the expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: ExpressionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// The panel expressions are evaluated on.
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    fn score(&self, expr: &Expr, normalization: Option<&Normalization>) -> FitnessResult {
        let (normalize, window, clip) = match normalization {
            Some(n) => (true, (n.window)(&expr.to_string()), n.clip_range),
            None => (false, 1, 1.0),
        };
        match self.evaluator.evaluate(expr, &self.panel, normalize, window, clip) {
            Ok(factor) => self.fitness.evaluate(
                &factor,
                &self.returns,
                self.label.as_ref(),
                expr.height(),
                expr.node_count(),
            ),
            Err(e) => self.fitness.failure(e.to_string()),
        }
    }

    /// Re-scores stored expressions in parallel.
    ///
    /// A text shaped like the normalization wrapper is scored the way mining
    /// scored it: its inner expression is evaluated with the stored window
    /// and clip, so coverage and complexity describe the inner expression.
    /// Any other text goes through the configured normalization. Unparseable
    /// texts score at the floor.
    pub fn reevaluate(&self, expressions: &[String]) -> Vec<(String, FitnessResult)> {
        expressions
            .par_iter()
            .map(|text| {
                let result = match parse_expr(text) {
                    Ok(expr) => match Normalization::strip(&expr) {
                        Some((inner, window, clip)) => {
                            self.score(&inner, Some(&Normalization::fixed(window, clip)))
                        }
                        None => self.score(&expr, self.normalization.as_ref()),
                    },
                    Err(e) => self.fitness.failure(e.to_string()),
                };
                (text.clone(), result)
            })
            .collect()
    }
}

impl FitnessFunction for FactorFitness {
    fn evaluate(&self, expr: &Expr) -> FitnessResult {
        self.score(expr, self.normalization.as_ref())
    }

    fn floor(&self) -> f64 {
        self.fitness.floor()
    }
}
