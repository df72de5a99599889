//! Positions of rolling extremes.

use super::rolling::rolling_full;
use ndarray::{Array2, ArrayView2};

/// Rows elapsed since the maximum of the trailing window (0 = current row).
///
/// Ties resolve to the most recent extreme.
pub fn ts_argmax(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| bars_since(w, |a, b| a >= b))
}

/// Rows elapsed since the minimum of the trailing window (0 = current row).
pub fn ts_argmin(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| bars_since(w, |a, b| a <= b))
}

fn bars_since(w: &[f64], better_or_equal: impl Fn(f64, f64) -> bool) -> f64 {
    let mut best = 0;
    for (i, &v) in w.iter().enumerate().skip(1) {
        if better_or_equal(v, w[best]) {
            best = i;
        }
    }
    (w.len() - 1 - best) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ts_argmax() {
        let x = array![[1.0], [5.0], [2.0], [3.0]];
        let out = ts_argmax(x.view(), 3);
        assert_eq!(out[[2, 0]], 1.0);
        assert_eq!(out[[3, 0]], 2.0);
    }

    #[test]
    fn test_ts_argmin() {
        let x = array![[1.0], [5.0], [2.0], [3.0]];
        let out = ts_argmin(x.view(), 3);
        assert_eq!(out[[2, 0]], 2.0);
        assert_eq!(out[[3, 0]], 1.0);
    }
}
