//! Lagged values and differences.

use ndarray::{Array2, ArrayView2, s};

/// Value `window` rows earlier; the first `window` rows are NaN.
pub fn ts_delay(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let mut out = Array2::from_elem((rows, cols), f64::NAN);
    if window < rows {
        out.slice_mut(s![window.., ..])
            .assign(&x.slice(s![..rows - window, ..]));
    }
    out
}

/// Difference to the value `window` rows earlier.
pub fn ts_delta(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    &x - &ts_delay(x, window)
}

/// Relative change to the value `window` rows earlier.
///
/// NaN when the earlier value is zero.
pub fn ts_pct_change(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let prev = ts_delay(x, window);
    let mut out = x.to_owned();
    out.zip_mut_with(&prev, |v, &p| {
        *v = if p == 0.0 { f64::NAN } else { *v / p - 1.0 };
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_ts_delay() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let out = ts_delay(x.view(), 1);
        assert!(out[[0, 0]].is_nan());
        assert_eq!(out[[1, 0]], 1.0);
        assert_eq!(out[[2, 1]], 20.0);

        let all_nan = ts_delay(x.view(), 5);
        assert!(all_nan.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ts_delta_and_pct_change() {
        let x = array![[100.0], [110.0], [99.0]];
        let delta = ts_delta(x.view(), 1);
        assert_eq!(delta[[1, 0]], 10.0);
        assert_eq!(delta[[2, 0]], -11.0);

        let pct = ts_pct_change(x.view(), 1);
        assert_abs_diff_eq!(pct[[1, 0]], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(pct[[2, 0]], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_ts_pct_change_zero_base() {
        let x = array![[0.0], [1.0]];
        assert!(ts_pct_change(x.view(), 1)[[1, 0]].is_nan());
    }
}
