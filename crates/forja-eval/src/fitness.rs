//! Composite fitness scoring of factor panels.
//!
//! A [`FitnessEvaluator`] turns a factor panel into a single scalar that the
//! search maximizes. Two modes are supported:
//!
//! - [`EvaluationMode::Ic`] scores predictive power only: IC, rank-IC and
//!   IC-IR against forward returns.
//! - [`EvaluationMode::Portfolio`] additionally simulates a long/short
//!   portfolio and blends in its Sharpe ratio, with penalties for turnover
//!   away from a target and for one-sided factors.
//!
//! Both modes subtract a complexity penalty for trees beyond a soft size and
//! add a bonus proportional to coverage.
//!
//! Scoring never fails. Anything that prevents a meaningful score, including
//! panics, yields an invalid result whose fitness is the configured floor.
//! Insufficient coverage scores strictly below the floor, in proportion to
//! the coverage gap, so that the search can still tell near-misses apart.

use crate::ic::ic_series;
use crate::metrics::{InformationRatio, finite_mean};
use crate::portfolio::{PortfolioConfig, simulate};
use forja_traits::{FactorPanel, ForjaError, Frame, Result};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// How candidates are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Information coefficient family only.
    #[default]
    Ic,
    /// IC family blended with a simulated long/short portfolio.
    Portfolio,
}

/// Fitness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Scoring mode.
    pub mode: EvaluationMode,
    /// Minimum common timestamps between factor and label.
    pub min_timestamps: usize,
    /// Minimum common assets between factor and label.
    pub min_assets: usize,
    /// Minimum raw coverage of the factor, in `[0, 1]`.
    pub min_coverage: f64,
    /// Use the relaxed floor instead of the strict one.
    pub relaxed: bool,
    /// Floor fitness in relaxed mode.
    pub relaxed_floor: f64,
    /// Floor fitness in strict mode.
    pub strict_floor: f64,
    /// Fitness lost below the floor per unit of missing coverage.
    pub coverage_gap_penalty: f64,
    /// Weight of IC × 100.
    pub ic_weight: f64,
    /// Weight of rank-IC × 100.
    pub rank_ic_weight: f64,
    /// Weight of IC-IR × 10.
    pub ir_weight: f64,
    /// Weight of the annualized Sharpe ratio (portfolio mode).
    pub sharpe_weight: f64,
    /// Tree depth above which the depth penalty applies.
    pub soft_max_depth: usize,
    /// Node count above which the node penalty applies.
    pub soft_max_nodes: usize,
    /// Penalty per level of depth above `soft_max_depth`.
    pub depth_penalty: f64,
    /// Penalty per node above `soft_max_nodes`.
    pub node_penalty: f64,
    /// Bonus per unit of coverage.
    pub coverage_bonus: f64,
    /// Fraction of assets in each portfolio leg.
    pub quantile: f64,
    /// Periods per year used for annualization.
    pub periods_per_year: f64,
    /// Annualized turnover the portfolio should stay near.
    pub target_turnover: f64,
    /// Penalty per unit of relative turnover above target.
    pub turnover_penalty: f64,
    /// Bonus per unit of relative turnover below target.
    pub turnover_bonus: f64,
    /// Penalty per unit of long/short imbalance.
    pub position_penalty: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            mode: EvaluationMode::Ic,
            min_timestamps: 100,
            min_assets: 2,
            min_coverage: 0.5,
            relaxed: true,
            relaxed_floor: -1_000.0,
            strict_floor: -1e9,
            coverage_gap_penalty: 10.0,
            ic_weight: 1.0,
            rank_ic_weight: 1.0,
            ir_weight: 1.0,
            sharpe_weight: 1.0,
            soft_max_depth: 6,
            soft_max_nodes: 30,
            depth_penalty: 0.5,
            node_penalty: 0.05,
            coverage_bonus: 1.0,
            quantile: 0.2,
            periods_per_year: 252.0,
            target_turnover: 100.0,
            turnover_penalty: 0.5,
            turnover_bonus: 0.1,
            position_penalty: 1.0,
        }
    }
}

impl FitnessConfig {
    /// Floor fitness for the configured mode.
    pub const fn floor(&self) -> f64 {
        if self.relaxed {
            self.relaxed_floor
        } else {
            self.strict_floor
        }
    }

    /// Checks weights, thresholds and portfolio settings.
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ForjaError::InvalidConfig(msg));

        let weights = [
            ("ic_weight", self.ic_weight),
            ("rank_ic_weight", self.rank_ic_weight),
            ("ir_weight", self.ir_weight),
            ("sharpe_weight", self.sharpe_weight),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return invalid(format!("{name} must be finite and non-negative, got {w}"));
            }
        }
        let active = match self.mode {
            EvaluationMode::Ic => &weights[..3],
            EvaluationMode::Portfolio => &weights[..],
        };
        if active.iter().all(|(_, w)| *w == 0.0) {
            return invalid("at least one fitness weight must be positive".into());
        }

        let penalties = [
            ("coverage_gap_penalty", self.coverage_gap_penalty),
            ("depth_penalty", self.depth_penalty),
            ("node_penalty", self.node_penalty),
            ("coverage_bonus", self.coverage_bonus),
            ("turnover_penalty", self.turnover_penalty),
            ("turnover_bonus", self.turnover_bonus),
            ("position_penalty", self.position_penalty),
        ];
        for (name, p) in penalties {
            if !p.is_finite() || p < 0.0 {
                return invalid(format!("{name} must be finite and non-negative, got {p}"));
            }
        }

        if !(0.0..=1.0).contains(&self.min_coverage) {
            return invalid(format!("min_coverage must be in [0, 1], got {}", self.min_coverage));
        }
        if !(self.quantile > 0.0 && self.quantile <= 0.5) {
            return invalid(format!("quantile must be in (0, 0.5], got {}", self.quantile));
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return invalid("periods_per_year must be positive".into());
        }
        if !(self.target_turnover.is_finite() && self.target_turnover > 0.0) {
            return invalid("target_turnover must be positive".into());
        }
        if self.min_assets < 2 || self.min_timestamps < 2 {
            return invalid("min_assets and min_timestamps must be at least 2".into());
        }
        if !self.relaxed_floor.is_finite() || !self.strict_floor.is_finite() {
            return invalid("fitness floors must be finite".into());
        }
        Ok(())
    }

    /// Penalty for trees beyond the soft depth and size limits.
    pub fn complexity_penalty(&self, depth: usize, node_count: usize) -> f64 {
        self.depth_penalty * depth.saturating_sub(self.soft_max_depth) as f64
            + self.node_penalty * node_count.saturating_sub(self.soft_max_nodes) as f64
    }
}

/// Scorecard of one factor. Created once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessResult {
    /// Scalar fitness (higher is better).
    pub fitness: f64,
    /// Mean Pearson IC.
    pub ic: f64,
    /// Mean Spearman rank-IC.
    pub rank_ic: f64,
    /// Standard deviation of IC.
    pub ic_std: f64,
    /// IC information ratio.
    pub ic_ir: f64,
    /// Annualized Sharpe ratio (portfolio mode).
    pub sharpe: Option<f64>,
    /// Compounded total return (portfolio mode).
    pub total_return: Option<f64>,
    /// Annualized turnover (portfolio mode).
    pub turnover: Option<f64>,
    /// Maximum drawdown (portfolio mode).
    pub max_drawdown: Option<f64>,
    /// Fraction of positive factor cells (portfolio mode).
    pub long_ratio: Option<f64>,
    /// Fraction of negative factor cells (portfolio mode).
    pub short_ratio: Option<f64>,
    /// Raw coverage of the factor, in `[0, 1]`.
    pub coverage: f64,
    /// Timestamps common to factor and label.
    pub n_periods: usize,
    /// Whether the score is meaningful.
    pub valid: bool,
    /// Why the factor could not be scored.
    pub error: Option<String>,
}

impl FitnessResult {
    /// An invalid result.
    pub fn invalid(fitness: f64, error: impl Into<String>, coverage: f64) -> Self {
        Self {
            fitness,
            ic: 0.0,
            rank_ic: 0.0,
            ic_std: 0.0,
            ic_ir: 0.0,
            sharpe: None,
            total_return: None,
            turnover: None,
            max_drawdown: None,
            long_ratio: None,
            short_ratio: None,
            coverage: clamp_unit(coverage),
            n_periods: 0,
            valid: false,
            error: Some(error.into()),
        }
    }
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}

/// Scores factor panels against forward returns.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
}

impl FitnessEvaluator {
    /// Creates an evaluator after validating `config`.
    pub fn new(config: FitnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    pub const fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Floor fitness for the configured mode.
    pub const fn floor(&self) -> f64 {
        self.config.floor()
    }

    /// Invalid result at exactly the floor.
    pub fn failure(&self, reason: impl Into<String>) -> FitnessResult {
        FitnessResult::invalid(self.floor(), reason, 0.0)
    }

    /// Scores `factor`.
    ///
    /// The label is `label` when given, otherwise `returns` shifted one
    /// period forward. `depth` and `node_count` describe the expression that
    /// produced the factor.
    pub fn evaluate(
        &self,
        factor: &FactorPanel,
        returns: &Frame,
        label: Option<&Frame>,
        depth: usize,
        node_count: usize,
    ) -> FitnessResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.score(factor, returns, label, depth, node_count)
        }));
        match outcome {
            Ok(Ok(result)) if result.fitness.is_finite() => result,
            Ok(Ok(result)) => FitnessResult {
                fitness: self.floor(),
                valid: false,
                error: Some("non-finite fitness".into()),
                ..result
            },
            Ok(Err(e)) => {
                debug!(error = %e, "fitness evaluation failed");
                self.failure(e.to_string())
            }
            Err(_) => self.failure("panic during fitness evaluation"),
        }
    }

    fn score(
        &self,
        factor: &FactorPanel,
        returns: &Frame,
        label: Option<&Frame>,
        depth: usize,
        node_count: usize,
    ) -> Result<FitnessResult> {
        let cfg = &self.config;
        let coverage = clamp_unit(factor.raw_coverage());

        if coverage < cfg.min_coverage {
            let gap = cfg.min_coverage - coverage;
            return Ok(FitnessResult::invalid(
                self.floor() - cfg.coverage_gap_penalty * gap,
                format!("coverage {coverage:.3} below minimum {:.3}", cfg.min_coverage),
                coverage,
            ));
        }

        let derived;
        let label = match label {
            Some(frame) => frame,
            None => {
                derived = returns.shift(-1);
                &derived
            }
        };

        let aligned = factor.frame().align(label);
        let n_periods = aligned.index.len();
        if n_periods < cfg.min_timestamps {
            return Err(ForjaError::InsufficientData(format!(
                "{n_periods} common timestamps, need {}",
                cfg.min_timestamps
            )));
        }
        if aligned.assets.len() < cfg.min_assets {
            return Err(ForjaError::InsufficientData(format!(
                "{} common assets, need {}",
                aligned.assets.len(),
                cfg.min_assets
            )));
        }

        let series = ic_series(aligned.left.view(), aligned.right.view());
        if series.valid_periods() == 0 {
            return Err(ForjaError::InsufficientData("no timestamp has a defined IC".into()));
        }
        let ir = InformationRatio::calculate(&series.ic);
        let rank_ic = finite_mean(&series.rank_ic);
        let rank_ic = if rank_ic.is_finite() { rank_ic } else { 0.0 };

        let mut fitness = cfg.ic_weight * ir.mean_ic * 100.0
            + cfg.rank_ic_weight * rank_ic * 100.0
            + cfg.ir_weight * ir.ir * 10.0
            - cfg.complexity_penalty(depth, node_count)
            + cfg.coverage_bonus * coverage;

        let mut result = FitnessResult {
            fitness,
            ic: ir.mean_ic,
            rank_ic,
            ic_std: ir.std_ic,
            ic_ir: ir.ir,
            sharpe: None,
            total_return: None,
            turnover: None,
            max_drawdown: None,
            long_ratio: None,
            short_ratio: None,
            coverage,
            n_periods,
            valid: true,
            error: None,
        };

        if cfg.mode == EvaluationMode::Portfolio {
            let realized = factor.frame().align(returns);
            let portfolio = simulate(
                realized.left.view(),
                realized.right.view(),
                &PortfolioConfig {
                    quantile: cfg.quantile,
                    periods_per_year: cfg.periods_per_year,
                },
            );

            let relative = portfolio.turnover / cfg.target_turnover;
            let turnover_term = if relative > 1.0 {
                -cfg.turnover_penalty * (relative - 1.0)
            } else {
                cfg.turnover_bonus * (1.0 - relative)
            };
            let imbalance = (portfolio.long_ratio - portfolio.short_ratio).abs();

            fitness += cfg.sharpe_weight * portfolio.sharpe + turnover_term
                - cfg.position_penalty * imbalance;

            result.fitness = fitness;
            result.sharpe = Some(portfolio.sharpe);
            result.total_return = Some(portfolio.total_return);
            result.turnover = Some(portfolio.turnover);
            result.max_drawdown = Some(portfolio.max_drawdown);
            result.long_ratio = Some(portfolio.long_ratio);
            result.short_ratio = Some(portfolio.short_ratio);
        }

        Ok(result)
    }
}
