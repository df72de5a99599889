//! Time-series operators applied down each asset column.
//!
//! This module provides rolling computations over a window of rows:
//! - Rolling aggregates: mean, sum, std, min, max, median, EMA, count
//! - Rolling standardization: z-score and percentile rank of the latest value
//! - Lags: delay, delta, percentage change
//! - Positions: bars since the rolling maximum/minimum
//! - Pairwise: rolling correlation
//!
//! Rolling aggregates need a full window of finite observations; anything
//! less yields NaN for that cell.

mod lag;
mod pairwise;
mod position;
mod rolling;

pub use lag::{ts_delay, ts_delta, ts_pct_change};
pub use pairwise::ts_corr;
pub use position::{ts_argmax, ts_argmin};
pub use rolling::{
    ts_count, ts_ema, ts_max, ts_mean, ts_median, ts_min, ts_rank, ts_std, ts_sum, ts_zscore,
};

use crate::registry::BuiltinOperator;
use forja_traits::{Arg, ArgKind, DimensionSet, OperatorCategory, Result};
use ndarray::{Array2, ArrayView2};

const SERIES_WINDOW: &[ArgKind] = &[ArgKind::Series(DimensionSet::ALL), ArgKind::Window];
const NUMERIC_WINDOW: &[ArgKind] = &[ArgKind::Series(DimensionSet::NUMERIC), ArgKind::Window];
const PAIR_WINDOW: &[ArgKind] = &[
    ArgKind::Series(DimensionSet::NUMERIC),
    ArgKind::Series(DimensionSet::NUMERIC),
    ArgKind::Window,
];

type WindowFn = fn(ArrayView2<'_, f64>, usize) -> Array2<f64>;

fn windowed(args: &[Arg<'_>], name: &str, f: WindowFn) -> Result<Array2<f64>> {
    Ok(f(args[0].series(name, 0)?, args[1].window(name, 1)?))
}

macro_rules! window_op {
    ($name:literal, $args:expr, $desc:literal, $func:path) => {
        BuiltinOperator::new(
            $name,
            OperatorCategory::TimeSeries,
            $args,
            $desc,
            |a| windowed(a, $name, $func),
        )
    };
}

pub(crate) fn operators() -> Vec<BuiltinOperator> {
    vec![
        window_op!("ts_mean", SERIES_WINDOW, "rolling mean", ts_mean),
        window_op!("ts_sum", SERIES_WINDOW, "rolling sum", ts_sum),
        window_op!("ts_std", SERIES_WINDOW, "rolling sample standard deviation", ts_std),
        window_op!("ts_min", SERIES_WINDOW, "rolling minimum", ts_min),
        window_op!("ts_max", SERIES_WINDOW, "rolling maximum", ts_max),
        window_op!("ts_median", SERIES_WINDOW, "rolling median", ts_median),
        window_op!("ts_ema", SERIES_WINDOW, "exponential moving average", ts_ema),
        window_op!("ts_count", SERIES_WINDOW, "finite observations in window", ts_count),
        window_op!("ts_zscore", NUMERIC_WINDOW, "rolling z-score", ts_zscore),
        window_op!("ts_rank", NUMERIC_WINDOW, "percentile of latest value in window", ts_rank),
        window_op!("ts_delay", SERIES_WINDOW, "value w rows ago", ts_delay),
        window_op!("ts_delta", SERIES_WINDOW, "x - ts_delay(x, w)", ts_delta),
        window_op!("ts_pct_change", NUMERIC_WINDOW, "x / ts_delay(x, w) - 1", ts_pct_change),
        window_op!("ts_argmax", NUMERIC_WINDOW, "rows since rolling maximum", ts_argmax),
        window_op!("ts_argmin", NUMERIC_WINDOW, "rows since rolling minimum", ts_argmin),
        BuiltinOperator::new(
            "ts_corr",
            OperatorCategory::TimeSeries,
            PAIR_WINDOW,
            "rolling Pearson correlation",
            |a| {
                ts_corr(
                    a[0].series("ts_corr", 0)?,
                    a[1].series("ts_corr", 1)?,
                    a[2].window("ts_corr", 2)?,
                )
            },
        ),
    ]
}
