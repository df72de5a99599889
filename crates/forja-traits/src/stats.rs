//! Statistical utility functions for factor processing.
//!
//! This module provides common statistical operations used across operator
//! implementations, the expression post-processing pipeline and the fitness
//! metrics, such as z-score standardization and correlation.

use ndarray::{Array2, ArrayView2};

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Z-score standardization result containing computed statistics.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeResult {
    /// The computed mean of the input values.
    pub mean: f64,
    /// The computed sample standard deviation (N-1 denominator).
    pub std: f64,
    /// Whether the standardization was applied (false if variance was too low).
    pub applied: bool,
}

/// Mean and sample standard deviation of the finite values in `values`.
///
/// Returns `None` when there are fewer than two finite values.
pub fn finite_mean_std(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let mut n = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    // Welford update
    for x in values.into_iter().filter(|x| x.is_finite()) {
        n += 1;
        let delta = x - mean;
        mean += delta / n as f64;
        m2 += delta * (x - mean);
    }
    if n < 2 {
        return None;
    }
    Some((mean, (m2 / (n - 1) as f64).sqrt()))
}

/// Standardize a slice of f64 values to z-scores in-place.
///
/// Uses sample standard deviation (N-1 denominator). Non-finite values are
/// excluded from the statistics and become NaN in the output. If the standard
/// deviation is below [`MIN_STD_THRESHOLD`], finite values are set to zero.
///
/// # Examples
///
/// ```
/// use forja_traits::stats::standardize_inplace;
///
/// let mut values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let result = standardize_inplace(&mut values);
///
/// assert!(result.applied);
/// assert!((result.mean - 3.0).abs() < 1e-10);
/// ```
pub fn standardize_inplace(values: &mut [f64]) -> StandardizeResult {
    let Some((mean, std)) = finite_mean_std(values.iter().copied()) else {
        let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        for v in values.iter_mut() {
            *v = if v.is_finite() { 0.0 } else { f64::NAN };
        }
        let mean = finite.first().copied().unwrap_or(f64::NAN);
        let std = if finite.len() == 1 { 0.0 } else { f64::NAN };
        return StandardizeResult {
            mean,
            std,
            applied: false,
        };
    };

    let applied = std > MIN_STD_THRESHOLD;
    for v in values.iter_mut() {
        *v = if !v.is_finite() {
            f64::NAN
        } else if applied {
            (*v - mean) / std
        } else {
            0.0
        };
    }

    StandardizeResult { mean, std, applied }
}

/// Rolling z-score down each column of a time × asset matrix.
///
/// Row `t` is standardized against the finite values in rows
/// `t + 1 - window ..= t` of the same column. Cells are NaN when the input is
/// not finite or fewer than two finite observations are in the window, and
/// zero when the window has no variance.
pub fn rolling_standardize(values: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = values.dim();
    let window = window.max(1);
    let mut out = Array2::from_elem((rows, cols), f64::NAN);

    for j in 0..cols {
        let column = values.column(j);
        for t in 0..rows {
            let x = column[t];
            if !x.is_finite() {
                continue;
            }
            let start = (t + 1).saturating_sub(window);
            if let Some((mean, std)) =
                finite_mean_std(column.iter().skip(start).take(t + 1 - start).copied())
            {
                out[[t, j]] = if std > MIN_STD_THRESHOLD {
                    (x - mean) / std
                } else {
                    0.0
                };
            }
        }
    }

    out
}

/// Pearson correlation over the pairs where both values are finite.
///
/// Returns NaN for fewer than two pairs or zero variance on either side.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= MIN_STD_THRESHOLD * MIN_STD_THRESHOLD || var_y <= MIN_STD_THRESHOLD * MIN_STD_THRESHOLD
    {
        return f64::NAN;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Ranks of values (0-based, ties share the average rank).
///
/// Non-finite inputs receive a NaN rank and are excluded from ranking.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i, v))
        .collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![f64::NAN; values.len()];
    let n = indexed.len();
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }
        i = j;
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_finite_mean_std() {
        let (mean, std) = finite_mean_std([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_abs_diff_eq!(mean, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(std, 2.5f64.sqrt(), epsilon = 1e-12);

        assert!(finite_mean_std([1.0, f64::NAN]).is_none());
    }

    #[test]
    fn test_standardize_inplace_basic() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = standardize_inplace(&mut values);

        assert!(result.applied);
        assert_abs_diff_eq!(result.mean, 3.0, epsilon = 1e-10);

        let std_mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert!(std_mean.abs() < 1e-10);
    }

    #[test]
    fn test_standardize_with_nan() {
        let mut values = vec![1.0, 2.0, f64::NAN, 4.0, 5.0];
        let result = standardize_inplace(&mut values);

        assert!(result.applied);
        assert_abs_diff_eq!(result.mean, 3.0, epsilon = 1e-10);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_standardize_constant_values() {
        let mut values = vec![5.0, 5.0, 5.0, 5.0];
        let result = standardize_inplace(&mut values);

        assert!(!result.applied);
        assert!(values.iter().all(|&x| x.abs() < 1e-10));
    }

    #[test]
    fn test_standardize_single_value() {
        let mut values = vec![42.0];
        let result = standardize_inplace(&mut values);

        assert!(!result.applied);
        assert_eq!(values, vec![0.0]);
    }

    #[test]
    fn test_min_std_threshold() {
        let mut values = vec![1.0, 1.0 + 1e-12, 1.0 - 1e-12, 1.0 + 2e-12];
        let result = standardize_inplace(&mut values);

        assert!(!result.applied);
        assert!(values.iter().all(|&x| x.abs() < 1e-10));
    }

    #[test]
    fn test_rolling_standardize() {
        let values = array![[1.0], [2.0], [3.0], [f64::NAN], [5.0]];
        let out = rolling_standardize(values.view(), 3);

        // first row has a single observation
        assert!(out[[0, 0]].is_nan());
        // rows 0..=1: mean 1.5, std ~0.707
        assert_abs_diff_eq!(out[[1, 0]], 0.5 / 0.5f64.sqrt(), epsilon = 1e-12);
        // rows 0..=2: mean 2, std 1
        assert_abs_diff_eq!(out[[2, 0]], 1.0, epsilon = 1e-12);
        assert!(out[[3, 0]].is_nan());
        // rows 2..=4 finite: 3, 5
        assert_abs_diff_eq!(out[[4, 0]], 1.0 / 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_standardize_constant_column_is_zero() {
        let values = array![[2.0], [2.0], [2.0]];
        let out = rolling_standardize(values.view(), 2);
        assert_eq!(out[[1, 0]], 0.0);
        assert_eq!(out[[2, 0]], 0.0);
    }

    #[test]
    fn test_rolling_standardize_window_stays_in_column() {
        let values = array![[1.0, 10.0], [100.0, 20.0], [3.0, 40.0], [4.0, 10.0]];
        let out = rolling_standardize(values.view(), 2);

        // rows 1..=2 of the second column: 20, 40
        assert_abs_diff_eq!(out[[2, 1]], 10.0 / 200.0f64.sqrt(), epsilon = 1e-12);
        // row 0 never enters the window at row 3
        assert_abs_diff_eq!(out[[3, 1]], -15.0 / 450.0f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(out[[3, 0]], 0.5 / 0.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_abs_diff_eq!(pearson(&x, &y), 1.0, epsilon = 1e-12);

        let z = [8.0, 6.0, 4.0, 2.0];
        assert_abs_diff_eq!(pearson(&x, &z), -1.0, epsilon = 1e-12);

        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[1.0, 2.0, 2.0, 3.0, f64::NAN]);
        assert_eq!(&ranks[..4], &[0.0, 1.5, 1.5, 3.0]);
        assert!(ranks[4].is_nan());
    }
}
