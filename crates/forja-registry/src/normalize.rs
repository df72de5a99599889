//! Deterministic normalization wrapper.
//!
//! Promoted factors are stored as full expressions of the form
//! `sanitize(clip(ts_zscore(sanitize(<inner>), W), C))`. The window `W` is
//! derived from a hash of the inner expression, so the same inner expression
//! always yields the same full expression, across runs and seeds.

use forja_evolve::Normalization;
use forja_expr::Expr;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Windows the hash selects from.
pub const WINDOW_CHOICES: [usize; 5] = [10, 20, 30, 40, 60];

/// Clip bound used when none is configured.
pub const DEFAULT_CLIP_RANGE: f64 = 3.0;

/// Z-score window for `inner`: the first eight bytes of its SHA-256 digest,
/// read big-endian, select one of [`WINDOW_CHOICES`].
pub fn derive_window(inner: &str) -> usize {
    let digest = Sha256::digest(inner.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(head);
    WINDOW_CHOICES[(value % WINDOW_CHOICES.len() as u64) as usize]
}

/// Output post-processing for mining that matches [`NormalizationSpec::wrap`].
pub fn hashed_normalization(clip_range: f64) -> Normalization {
    Normalization {
        clip_range,
        window: Arc::new(derive_window),
    }
}

/// Parameters of the normalization wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSpec {
    /// Rolling z-score window.
    pub window: usize,
    /// Symmetric clip bound.
    pub clip_range: f64,
}

impl NormalizationSpec {
    /// Wrapper parameters for `inner`, with its hash-derived window.
    pub fn derive(inner: &Expr, clip_range: f64) -> Self {
        Self {
            window: derive_window(&inner.to_string()),
            clip_range,
        }
    }

    /// Wraps `inner` into the full expression.
    pub fn wrap(&self, inner: &Expr) -> Expr {
        let standardized = Expr::apply(
            "ts_zscore",
            vec![
                Expr::apply("sanitize", vec![inner.clone()]),
                Expr::window(self.window),
            ],
        );
        Expr::apply(
            "sanitize",
            vec![Expr::apply(
                "clip",
                vec![standardized, Expr::constant(self.clip_range)],
            )],
        )
    }

    /// Splits a full expression into its inner expression and spec.
    ///
    /// Returns `None` when `full` is not shaped like a wrapper.
    pub fn unwrap_full(full: &Expr) -> Option<(Expr, Self)> {
        let (inner, window, clip_range) = Normalization::strip(full)?;
        Some((inner, Self { window, clip_range }))
    }
}

/// An inner expression with its normalization applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Canonical text of the full expression.
    pub expression: String,
    /// Canonical text of the inner expression.
    pub inner_expression: String,
    /// The wrapper parameters.
    pub spec: NormalizationSpec,
}

impl Normalized {
    /// Normalizes an inner expression with its hash-derived window.
    pub fn from_inner(inner: &Expr, clip_range: f64) -> Self {
        let spec = NormalizationSpec::derive(inner, clip_range);
        Self {
            expression: spec.wrap(inner).to_string(),
            inner_expression: inner.to_string(),
            spec,
        }
    }

    /// Accepts either a full or an inner expression. Full expressions keep
    /// their own window and clip bound.
    pub fn from_any(expr: &Expr, clip_range: f64) -> Self {
        match NormalizationSpec::unwrap_full(expr) {
            Some((inner, spec)) => Self {
                expression: expr.to_string(),
                inner_expression: inner.to_string(),
                spec,
            },
            None => Self::from_inner(expr, clip_range),
        }
    }
}
