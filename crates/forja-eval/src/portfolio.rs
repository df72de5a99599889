//! Long/short portfolio simulation.
//!
//! Each period the portfolio holds the top `quantile` of the previous
//! period's factor values long and the bottom `quantile` short, each leg
//! carrying half of the gross exposure. Positions are formed from the factor
//! lagged by one row, so the return realized in row `t` is earned by a
//! position decided with data up to row `t - 1`.

use forja_traits::stats::{MIN_STD_THRESHOLD, finite_mean_std};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Portfolio construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Fraction of assets held in each leg, in `(0, 0.5]`.
    pub quantile: f64,
    /// Periods per year used for annualization.
    pub periods_per_year: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            quantile: 0.2,
            periods_per_year: 252.0,
        }
    }
}

/// Simulation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioResult {
    /// Strategy return per period
    pub returns: Vec<f64>,
    /// Annualized Sharpe ratio
    pub sharpe: f64,
    /// Compounded total return
    pub total_return: f64,
    /// Annualized turnover (sum of absolute position changes)
    pub turnover: f64,
    /// Maximum peak-to-trough loss of the equity curve, in `[0, 1]` for
    /// returns above -100%
    pub max_drawdown: f64,
    /// Fraction of finite factor cells that are positive
    pub long_ratio: f64,
    /// Fraction of finite factor cells that are negative
    pub short_ratio: f64,
}

impl PortfolioResult {
    /// Calculate the annualized Sharpe ratio from per-period returns.
    ///
    /// Zero when fewer than two finite returns or no dispersion.
    pub fn calculate_sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
        match finite_mean_std(returns.iter().copied()) {
            Some((mean, std)) if std > MIN_STD_THRESHOLD => mean / std * periods_per_year.sqrt(),
            _ => 0.0,
        }
    }

    /// Calculate the maximum drawdown of the compounded equity curve.
    pub fn calculate_max_drawdown(returns: &[f64]) -> f64 {
        let mut equity = 1.0;
        let mut peak = 1.0;
        let mut max_dd: f64 = 0.0;

        for r in returns.iter().filter(|r| r.is_finite()) {
            equity *= 1.0 + r;
            peak = f64::max(peak, equity);
            if peak > 0.0 {
                max_dd = max_dd.max((peak - equity) / peak);
            }
        }

        max_dd
    }
}

/// Positions for one row of factor values.
///
/// The top `k` finite values get `+0.5 / k`, the bottom `k` get `-0.5 / k`,
/// with `k = max(1, floor(n * quantile))` capped at `n / 2`. Rows with fewer
/// than two finite values hold nothing.
pub fn construct_positions(scores: &[f64], quantile: f64) -> Vec<f64> {
    let mut positions = vec![0.0; scores.len()];
    let mut ranked: Vec<(usize, f64)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .collect();

    let n = ranked.len();
    if n < 2 {
        return positions;
    }

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let k = ((n as f64 * quantile).floor() as usize).clamp(1, n / 2);
    let weight = 0.5 / k as f64;

    for &(idx, _) in ranked.iter().take(k) {
        positions[idx] = weight;
    }
    for &(idx, _) in ranked.iter().skip(n - k) {
        positions[idx] = -weight;
    }

    positions
}

/// Simulates the long/short portfolio of an aligned factor/return pair.
///
/// Missing returns contribute nothing to a period's return.
pub fn simulate(
    factor: ArrayView2<'_, f64>,
    returns: ArrayView2<'_, f64>,
    config: &PortfolioConfig,
) -> PortfolioResult {
    let (rows, cols) = factor.dim();
    let rows = rows.min(returns.nrows());

    let mut positions = Array2::<f64>::zeros((rows, cols));
    for t in 1..rows {
        let scores = factor.row(t - 1).to_vec();
        let row = construct_positions(&scores, config.quantile);
        positions.row_mut(t).assign(&ndarray::Array1::from(row));
    }

    let strategy: Vec<f64> = (1..rows)
        .map(|t| {
            positions
                .row(t)
                .iter()
                .zip(returns.row(t))
                .map(|(&p, &r)| if r.is_finite() { p * r } else { 0.0 })
                .sum()
        })
        .collect();

    let changes: Vec<f64> = (2..rows)
        .map(|t| {
            positions
                .row(t)
                .iter()
                .zip(positions.row(t - 1))
                .map(|(a, b)| (a - b).abs())
                .sum()
        })
        .collect();
    let turnover = if changes.is_empty() {
        0.0
    } else {
        changes.iter().sum::<f64>() / changes.len() as f64 * config.periods_per_year
    };

    let total_return = strategy.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;

    let finite = factor.iter().filter(|v| v.is_finite()).count();
    let (long_ratio, short_ratio) = if finite == 0 {
        (0.0, 0.0)
    } else {
        let long = factor.iter().filter(|v| v.is_finite() && **v > 0.0).count();
        let short = factor.iter().filter(|v| v.is_finite() && **v < 0.0).count();
        (long as f64 / finite as f64, short as f64 / finite as f64)
    };

    PortfolioResult {
        sharpe: PortfolioResult::calculate_sharpe(&strategy, config.periods_per_year),
        max_drawdown: PortfolioResult::calculate_max_drawdown(&strategy),
        returns: strategy,
        total_return,
        turnover,
        long_ratio,
        short_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_construct_positions_long_short() {
        let positions = construct_positions(&[0.5, -0.3, 0.8, -0.6, 0.1], 0.4);
        assert_eq!(positions, vec![0.25, -0.25, 0.25, -0.25, 0.0]);
        assert_abs_diff_eq!(positions.iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_construct_positions_sparse_row() {
        assert_eq!(construct_positions(&[f64::NAN, 1.0], 0.5), vec![0.0, 0.0]);
        assert_eq!(construct_positions(&[2.0, 1.0, f64::NAN], 0.1), vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn test_calculate_sharpe() {
        let sharpe = PortfolioResult::calculate_sharpe(&[0.01, -0.005, 0.015, 0.002, -0.003], 252.0);
        assert!(sharpe.is_finite() && sharpe > 0.0);
        assert_eq!(PortfolioResult::calculate_sharpe(&[0.01, 0.01], 252.0), 0.0);
    }

    #[test]
    fn test_calculate_max_drawdown() {
        let dd = PortfolioResult::calculate_max_drawdown(&[0.1, -0.5, 0.2]);
        assert_abs_diff_eq!(dd, 0.5, epsilon = 1e-12);
        assert_eq!(PortfolioResult::calculate_max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn test_simulate_uses_lagged_factor() {
        // the factor in row t-1 predicts the return in row t
        let factor = array![[1.0, -1.0], [-1.0, 1.0], [1.0, -1.0], [0.0, 0.0]];
        let returns = array![[0.0, 0.0], [0.02, -0.02], [-0.01, 0.01], [0.03, -0.03]];
        let config = PortfolioConfig {
            quantile: 0.5,
            periods_per_year: 1.0,
        };
        let result = simulate(factor.view(), returns.view(), &config);

        assert_eq!(result.returns.len(), 3);
        assert_abs_diff_eq!(result.returns[0], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(result.returns[1], 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(result.returns[2], 0.03, epsilon = 1e-12);
        assert!(result.total_return > 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        // every rebalance flips both legs
        assert_abs_diff_eq!(result.turnover, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.long_ratio, 0.375);
        assert_abs_diff_eq!(result.short_ratio, 0.375);
    }

    #[test]
    fn test_missing_returns_contribute_nothing() {
        let factor = array![[1.0, -1.0], [1.0, -1.0]];
        let returns = array![[0.0, 0.0], [f64::NAN, -0.02]];
        let result = simulate(factor.view(), returns.view(), &PortfolioConfig::default());
        assert_abs_diff_eq!(result.returns[0], 0.01, epsilon = 1e-12);
    }
}
