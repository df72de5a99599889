//! Rolling statistics over two series.

use forja_traits::stats::pearson;
use forja_traits::{ForjaError, Result};
use ndarray::{Array2, ArrayView2};

/// Rolling Pearson correlation between matching columns of `x` and `y`.
///
/// A window needs at least `max(2, window / 2)` finite pairs; constant
/// windows yield NaN.
pub fn ts_corr(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, window: usize) -> Result<Array2<f64>> {
    if x.dim() != y.dim() {
        return Err(ForjaError::ShapeMismatch(format!(
            "ts_corr: {:?} vs {:?}",
            x.dim(),
            y.dim()
        )));
    }

    let (rows, cols) = x.dim();
    let window = window.max(2);
    let min_pairs = (window / 2).max(2);
    let mut out = Array2::from_elem((rows, cols), f64::NAN);
    let mut xs = Vec::with_capacity(window);
    let mut ys = Vec::with_capacity(window);

    for j in 0..cols {
        for t in (window - 1)..rows {
            xs.clear();
            ys.clear();
            for i in t + 1 - window..=t {
                let (a, b) = (x[[i, j]], y[[i, j]]);
                if a.is_finite() && b.is_finite() {
                    xs.push(a);
                    ys.push(b);
                }
            }
            if xs.len() >= min_pairs {
                out[[t, j]] = pearson(&xs, &ys);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_ts_corr_perfect() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![[2.0], [4.0], [6.0], [8.0]];
        let out = ts_corr(x.view(), y.view(), 3).unwrap();
        assert!(out[[1, 0]].is_nan());
        assert_abs_diff_eq!(out[[2, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[3, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ts_corr_shape_mismatch() {
        let x = array![[1.0, 2.0]];
        let y = array![[1.0]];
        assert!(ts_corr(x.view(), y.view(), 2).is_err());
    }
}
