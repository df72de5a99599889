//! Rolling aggregates over a trailing window.

use forja_traits::stats::rolling_standardize;
use ndarray::{Array2, ArrayView2};

/// Applies `f` to every full window of finite values down each column.
pub(super) fn rolling_full(
    x: ArrayView2<'_, f64>,
    window: usize,
    f: impl Fn(&[f64]) -> f64,
) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let window = window.max(1);
    let mut out = Array2::from_elem((rows, cols), f64::NAN);
    let mut buf = Vec::with_capacity(window);

    for j in 0..cols {
        let column = x.column(j);
        for t in (window - 1)..rows {
            buf.clear();
            buf.extend((t + 1 - window..=t).map(|i| column[i]));
            if buf.iter().all(|v| v.is_finite()) {
                out[[t, j]] = f(&buf);
            }
        }
    }

    out
}

/// Rolling mean.
pub fn ts_mean(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sum.
pub fn ts_sum(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| w.iter().sum())
}

/// Rolling sample standard deviation (NaN for windows shorter than 2).
pub fn ts_std(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| {
        if w.len() < 2 {
            return f64::NAN;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        var.sqrt()
    })
}

/// Rolling minimum.
pub fn ts_min(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Rolling maximum.
pub fn ts_max(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Rolling median.
pub fn ts_median(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| {
        let mut sorted = w.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    })
}

/// Percentile of the latest value within its window, in `[0, 1]`.
pub fn ts_rank(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_full(x, window, |w| {
        if w.len() < 2 {
            return 0.5;
        }
        let last = w[w.len() - 1];
        let below = w.iter().filter(|&&v| v < last).count() as f64;
        let ties = w.iter().filter(|&&v| v == last).count() as f64 - 1.0;
        (below + 0.5 * ties) / (w.len() - 1) as f64
    })
}

/// Rolling z-score; shares its definition with the factor normalization step.
pub fn ts_zscore(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    rolling_standardize(x, window)
}

/// Exponential moving average with `alpha = 2 / (window + 1)`.
///
/// Missing inputs leave the running average untouched and produce NaN.
pub fn ts_ema(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let alpha = 2.0 / (window.max(1) as f64 + 1.0);
    let mut out = Array2::from_elem((rows, cols), f64::NAN);

    for j in 0..cols {
        let mut state: Option<f64> = None;
        for t in 0..rows {
            let v = x[[t, j]];
            if !v.is_finite() {
                continue;
            }
            let next = state.map_or(v, |s| alpha * v + (1.0 - alpha) * s);
            state = Some(next);
            out[[t, j]] = next;
        }
    }

    out
}

/// Number of finite observations in the trailing window.
pub fn ts_count(x: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let window = window.max(1);
    let mut out = Array2::zeros((rows, cols));

    for j in 0..cols {
        for t in 0..rows {
            let start = (t + 1).saturating_sub(window);
            out[[t, j]] = (start..=t).filter(|&i| x[[i, j]].is_finite()).count() as f64;
        }
    }

    out
}
