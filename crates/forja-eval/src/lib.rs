//! Fitness scoring for Forja factors.
//!
//! This crate turns evaluated factor panels into scalar fitness values:
//! - Information Coefficient (IC) and rank-IC per timestamp
//! - IC stability as an Information Ratio
//! - Long/short portfolio simulation (Sharpe, turnover, drawdown)
//! - Composite fitness with complexity and coverage terms
//!
//! # Example
//!
//! ```rust,ignore
//! use forja_eval::{FitnessConfig, FitnessEvaluator};
//!
//! let evaluator = FitnessEvaluator::new(FitnessConfig::default())?;
//! let result = evaluator.evaluate(&factor, &returns, None, expr.height(), expr.node_count());
//! println!("fitness {:.3} (IC {:.4})", result.fitness, result.ic);
//! ```

pub mod fitness;
pub mod ic;
pub mod metrics;
pub mod portfolio;

// Re-export main types
pub use fitness::{EvaluationMode, FitnessConfig, FitnessEvaluator, FitnessResult};
pub use ic::{IcSeries, calculate_ic, calculate_rank_ic, ic_series};
pub use metrics::{InformationRatio, finite_mean};
pub use portfolio::{PortfolioConfig, PortfolioResult, construct_positions, simulate};
