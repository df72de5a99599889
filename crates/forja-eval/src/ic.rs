//! Information Coefficient (IC) calculations.
//!
//! IC is the cross-sectional Pearson correlation between factor values and
//! forward returns at one timestamp; rank-IC is the Spearman correlation of
//! the same pairs. Only pairs where both values are finite take part.

use forja_traits::stats::{average_ranks, pearson};
use ndarray::ArrayView2;

fn finite_pairs(factor: &[f64], labels: &[f64]) -> (Vec<f64>, Vec<f64>) {
    factor
        .iter()
        .zip(labels)
        .filter(|(f, l)| f.is_finite() && l.is_finite())
        .map(|(&f, &l)| (f, l))
        .unzip()
}

/// Pearson IC between factor values and forward returns.
///
/// Returns NaN for fewer than two finite pairs or zero variance.
///
/// # Example
///
/// ```
/// use forja_eval::calculate_ic;
///
/// let ic = calculate_ic(&[1.0, 2.0, 3.0], &[0.01, 0.02, 0.03]);
/// assert!((ic - 1.0).abs() < 1e-12);
/// ```
pub fn calculate_ic(factor: &[f64], labels: &[f64]) -> f64 {
    if factor.len() != labels.len() {
        return f64::NAN;
    }
    let (x, y) = finite_pairs(factor, labels);
    pearson(&x, &y)
}

/// Spearman rank-IC between factor values and forward returns.
///
/// Ties share their average rank.
pub fn calculate_rank_ic(factor: &[f64], labels: &[f64]) -> f64 {
    if factor.len() != labels.len() {
        return f64::NAN;
    }
    let (x, y) = finite_pairs(factor, labels);
    if x.len() < 2 {
        return f64::NAN;
    }
    pearson(&average_ranks(&x), &average_ranks(&y))
}

/// Per-timestamp IC and rank-IC of an aligned factor/label pair.
#[derive(Debug, Clone, Default)]
pub struct IcSeries {
    /// Pearson IC per row; NaN where undefined.
    pub ic: Vec<f64>,
    /// Spearman rank-IC per row; NaN where undefined.
    pub rank_ic: Vec<f64>,
}

impl IcSeries {
    /// Rows where the IC is defined.
    pub fn valid_periods(&self) -> usize {
        self.ic.iter().filter(|v| v.is_finite()).count()
    }
}

/// Computes IC and rank-IC for every row of two time × asset matrices.
///
/// Both matrices must already be aligned on timestamps and assets.
pub fn ic_series(factor: ArrayView2<'_, f64>, labels: ArrayView2<'_, f64>) -> IcSeries {
    let rows = factor.nrows().min(labels.nrows());
    let mut series = IcSeries {
        ic: Vec::with_capacity(rows),
        rank_ic: Vec::with_capacity(rows),
    };

    for t in 0..rows {
        let f: Vec<f64> = factor.row(t).to_vec();
        let l: Vec<f64> = labels.row(t).to_vec();
        series.ic.push(calculate_ic(&f, &l));
        series.rank_ic.push(calculate_rank_ic(&f, &l));
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_calculate_ic_perfect_correlation() {
        let ic = calculate_ic(&[1.0, 2.0, 3.0, 4.0, 5.0], &[0.01, 0.02, 0.03, 0.04, 0.05]);
        assert_abs_diff_eq!(ic, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rank_ic_is_monotone_invariant() {
        let factor = [1.0, 2.0, 3.0, 4.0, 5.0];
        let labels = [0.01, 0.04, 0.09, 0.16, 10.0];
        assert_abs_diff_eq!(calculate_rank_ic(&factor, &labels), 1.0, epsilon = 1e-10);
        assert!(calculate_ic(&factor, &labels) < 1.0);
    }

    #[test]
    fn test_calculate_ic_negative_correlation() {
        let ic = calculate_rank_ic(&[5.0, 4.0, 3.0, 2.0, 1.0], &[0.01, 0.02, 0.03, 0.04, 0.05]);
        assert_abs_diff_eq!(ic, -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_calculate_ic_with_nans() {
        let ic = calculate_ic(&[1.0, 2.0, f64::NAN, 4.0], &[0.01, 0.02, 0.03, 0.04]);
        assert!(ic.is_finite());
    }

    #[test]
    fn test_undefined_rows() {
        assert!(calculate_ic(&[1.0, f64::NAN], &[0.1, 0.2]).is_nan());
        assert!(calculate_rank_ic(&[1.0, 1.0, 1.0], &[0.1, 0.2, 0.3]).is_nan());
        assert!(calculate_ic(&[1.0, 2.0], &[0.1]).is_nan());
    }

    #[test]
    fn test_ic_series() {
        let factor = array![[1.0, 2.0, 3.0], [3.0, 2.0, 1.0], [1.0, f64::NAN, f64::NAN]];
        let labels = array![[0.01, 0.02, 0.03], [0.01, 0.02, 0.03], [0.01, 0.02, 0.03]];
        let series = ic_series(factor.view(), labels.view());
        assert_eq!(series.ic.len(), 3);
        assert_abs_diff_eq!(series.ic[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(series.rank_ic[1], -1.0, epsilon = 1e-10);
        assert!(series.ic[2].is_nan());
        assert_eq!(series.valid_periods(), 2);
    }
}
