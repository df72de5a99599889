//! Dimension tracking for expression composition.
//!
//! The tracker decides which [`Dimension`] an operator produces from the
//! dimensions of its inputs and rejects compositions that make no physical
//! sense, such as adding a price to a volume. It runs while trees are
//! generated so that nonsensical candidates are discarded before evaluation.
//!
//! Multiplications and divisions without a specific rule resolve to
//! [`Dimension::Ratio`]. Such resolutions are flagged: they are logged,
//! counted, and reported in [`Resolution::fallback`].

use forja_traits::{Dimension, ForjaError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// The four arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinaryOp {
    /// Maps an operator name to an arithmetic operator.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            _ => None,
        }
    }

    /// Operator name used in expression text.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Outcome of [`DimensionTracker::check_binary_op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCheck {
    /// Resulting dimension (meaningful only when `valid`).
    pub dimension: Dimension,
    /// Whether the composition is allowed.
    pub valid: bool,
    /// Why the composition was rejected or fell back to a default.
    pub reason: Option<String>,
    /// Whether the result came from the catch-all ratio rule.
    pub fallback: bool,
}

impl BinaryCheck {
    const fn ok(dimension: Dimension) -> Self {
        Self {
            dimension,
            valid: true,
            reason: None,
            fallback: false,
        }
    }

    fn rejected(op: BinaryOp, a: Dimension, b: Dimension) -> Self {
        Self {
            dimension: Dimension::Ratio,
            valid: false,
            reason: Some(format!("cannot combine {a} {} {b}", op.symbol())),
            fallback: false,
        }
    }

    fn fallback(op: BinaryOp, a: Dimension, b: Dimension) -> Self {
        Self {
            dimension: Dimension::Ratio,
            valid: true,
            reason: Some(format!("no rule for {a} {} {b}, defaulting to RATIO", op.symbol())),
            fallback: true,
        }
    }
}

/// How a named operator derives its output dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionRule {
    /// Always [`Dimension::Ratio`] (standardization, ranking, log/exp/sign/abs, correlation).
    Ratio,
    /// The first input's dimension (rolling aggregates, lag/diff, clip, fill).
    Preserve,
    /// Always [`Dimension::Time`] (arg-min/max).
    TimePosition,
    /// A fixed dimension.
    Fixed(Dimension),
    /// Arithmetic rules of [`DimensionTracker::check_binary_op`].
    Arithmetic(BinaryOp),
}

/// Output dimension of an operator application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved dimension.
    pub dimension: Dimension,
    /// Set when the dimension came from the catch-all ratio rule.
    pub fallback: Option<String>,
}

const RATIO_OPS: &[&str] = &[
    "ts_zscore",
    "ts_rank",
    "ts_corr",
    "cs_zscore",
    "cs_rank",
    "log",
    "exp",
    "sign",
    "abs",
    "sqrt",
    "tanh",
    "sigmoid",
];

const PRESERVING_OPS: &[&str] = &[
    "ts_mean",
    "ts_sum",
    "ts_std",
    "ts_min",
    "ts_max",
    "ts_median",
    "ts_ema",
    "ts_delay",
    "ts_delta",
    "clip",
    "sanitize",
    "neg",
    "cs_demean",
];

const TIME_OPS: &[&str] = &["ts_argmax", "ts_argmin"];

/// Resolves and validates operator output dimensions.
///
/// Cloning shares the fallback counter.
#[derive(Debug, Clone)]
pub struct DimensionTracker {
    rules: HashMap<String, DimensionRule>,
    fallbacks: Arc<AtomicUsize>,
}

impl Default for DimensionTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DimensionTracker {
    /// A tracker with no named-operator rules.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            fallbacks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A tracker knowing every builtin operator.
    pub fn with_defaults() -> Self {
        let mut tracker = Self::new();
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div] {
            tracker.register(op.name(), DimensionRule::Arithmetic(op));
        }
        for name in RATIO_OPS {
            tracker.register(*name, DimensionRule::Ratio);
        }
        for name in PRESERVING_OPS {
            tracker.register(*name, DimensionRule::Preserve);
        }
        for name in TIME_OPS {
            tracker.register(*name, DimensionRule::TimePosition);
        }
        tracker.register("ts_pct_change", DimensionRule::Fixed(Dimension::Return));
        tracker.register("ts_count", DimensionRule::Fixed(Dimension::Count));
        tracker
    }

    /// Registers or replaces the rule for an operator.
    pub fn register(&mut self, name: impl Into<String>, rule: DimensionRule) {
        self.rules.insert(name.into(), rule);
    }

    /// The rule for an operator, if one is registered.
    pub fn rule_for(&self, name: &str) -> Option<DimensionRule> {
        self.rules.get(name).copied()
    }

    /// Checks an arithmetic composition.
    pub fn check_binary_op(&self, op: BinaryOp, a: Dimension, b: Dimension) -> BinaryCheck {
        match op {
            BinaryOp::Add | BinaryOp::Sub => {
                if a == b {
                    BinaryCheck::ok(a)
                } else if a.is_neutral() {
                    BinaryCheck::ok(b)
                } else if b.is_neutral() {
                    BinaryCheck::ok(a)
                } else if a.is_dimensionless() && b.is_dimensionless() {
                    BinaryCheck::ok(Dimension::Ratio)
                } else {
                    BinaryCheck::rejected(op, a, b)
                }
            }
            BinaryOp::Mul => match (a, b) {
                (x, y) if x.is_neutral() => BinaryCheck::ok(y),
                (x, y) if y.is_neutral() => BinaryCheck::ok(x),
                (Dimension::Price, Dimension::Volume) | (Dimension::Volume, Dimension::Price) => {
                    BinaryCheck::ok(Dimension::QuoteVolume)
                }
                (x, y) if x.is_dimensionless() && y.is_dimensionless() => {
                    BinaryCheck::ok(Dimension::Ratio)
                }
                (x, y) if x.is_dimensionless() => BinaryCheck::ok(y),
                (x, y) if y.is_dimensionless() => BinaryCheck::ok(x),
                _ => BinaryCheck::fallback(op, a, b),
            },
            BinaryOp::Div => match (a, b) {
                (x, y) if y.is_neutral() => BinaryCheck::ok(x),
                (x, y) if x == y => BinaryCheck::ok(Dimension::Ratio),
                (Dimension::QuoteVolume, Dimension::Price) => BinaryCheck::ok(Dimension::Volume),
                (Dimension::QuoteVolume, Dimension::Volume) => BinaryCheck::ok(Dimension::Price),
                (x, y) if y.is_dimensionless() => BinaryCheck::ok(x),
                _ => BinaryCheck::fallback(op, a, b),
            },
        }
    }

    /// Resolves the output dimension without side effects.
    ///
    /// Operators without a registered rule resolve to [`Dimension::Ratio`]
    /// with a fallback note.
    pub fn resolve(&self, op: &str, inputs: &[Dimension]) -> Result<Resolution> {
        let Some(rule) = self.rule_for(op) else {
            return Ok(Resolution {
                dimension: Dimension::Ratio,
                fallback: Some(format!("no dimension rule for operator {op}, defaulting to RATIO")),
            });
        };

        let resolved = |dimension| Resolution {
            dimension,
            fallback: None,
        };

        match rule {
            DimensionRule::Ratio => Ok(resolved(Dimension::Ratio)),
            DimensionRule::TimePosition => Ok(resolved(Dimension::Time)),
            DimensionRule::Fixed(dim) => Ok(resolved(dim)),
            DimensionRule::Preserve => inputs.first().copied().map(resolved).ok_or_else(|| {
                ForjaError::DimensionMismatch(format!("{op} needs at least one input"))
            }),
            DimensionRule::Arithmetic(bin) => {
                let [a, b] = inputs else {
                    return Err(ForjaError::DimensionMismatch(format!(
                        "{op} needs two inputs, got {}",
                        inputs.len()
                    )));
                };
                let check = self.check_binary_op(bin, *a, *b);
                if !check.valid {
                    return Err(ForjaError::DimensionMismatch(
                        check.reason.unwrap_or_else(|| format!("{op} rejected")),
                    ));
                }
                Ok(Resolution {
                    dimension: check.dimension,
                    fallback: check.fallback.then(|| check.reason.unwrap_or_default()),
                })
            }
        }
    }

    /// Output dimension of `op` applied to `inputs`.
    ///
    /// Identical arguments always give the identical result. Fallback
    /// resolutions are logged and counted in [`Self::fallback_count`].
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::DimensionMismatch`] for rejected compositions.
    pub fn get_output_dimension(&self, op: &str, inputs: &[Dimension]) -> Result<Dimension> {
        let resolution = self.resolve(op, inputs)?;
        if let Some(reason) = &resolution.fallback {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            warn!(operator = op, ?inputs, "dimension fallback: {reason}");
        }
        Ok(resolution.dimension)
    }

    /// Number of fallback resolutions seen by this tracker and its clones.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

/// Dimension of a panel column, inferred from its name.
///
/// Unrecognised names are [`Dimension::Any`].
pub fn dimension_for_column(name: &str) -> Dimension {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "open" | "high" | "low" | "close" | "vwap" | "price" | "mid" => Dimension::Price,
        "return" | "returns" | "ret" => Dimension::Return,
        "trades" | "count" | "num_trades" | "trade_count" => Dimension::Count,
        s if s.contains("quote") || s.contains("notional") || s.contains("amount") => {
            Dimension::QuoteVolume
        }
        s if s.contains("volume") => Dimension::Volume,
        s if s.starts_with("return_") => Dimension::Return,
        _ => Dimension::Any,
    }
}
