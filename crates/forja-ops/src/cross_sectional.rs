//! Cross-sectional operators applied across assets within each row.
//!
//! Each row is processed independently; missing cells stay missing and are
//! excluded from the row statistics.

use crate::registry::BuiltinOperator;
use forja_traits::stats::{average_ranks, standardize_inplace};
use forja_traits::{ArgKind, DimensionSet, OperatorCategory};
use ndarray::{Array2, ArrayView2};

const ROW: &[ArgKind] = &[ArgKind::Series(DimensionSet::NUMERIC)];

pub(crate) fn operators() -> Vec<BuiltinOperator> {
    vec![
        BuiltinOperator::new(
            "cs_rank",
            OperatorCategory::CrossSectional,
            ROW,
            "percentile rank across assets",
            |a| Ok(cs_rank(a[0].series("cs_rank", 0)?)),
        ),
        BuiltinOperator::new(
            "cs_zscore",
            OperatorCategory::CrossSectional,
            ROW,
            "z-score across assets",
            |a| Ok(cs_zscore(a[0].series("cs_zscore", 0)?)),
        ),
        BuiltinOperator::new(
            "cs_demean",
            OperatorCategory::CrossSectional,
            ROW,
            "subtract the cross-sectional mean",
            |a| Ok(cs_demean(a[0].series("cs_demean", 0)?)),
        ),
    ]
}

fn map_rows(x: ArrayView2<'_, f64>, f: impl Fn(&mut Vec<f64>)) -> Array2<f64> {
    let mut out = x.to_owned();
    let mut buf = Vec::with_capacity(x.ncols());
    for mut row in out.rows_mut() {
        buf.clear();
        buf.extend(row.iter().copied());
        f(&mut buf);
        for (dst, src) in row.iter_mut().zip(buf.iter()) {
            *dst = *src;
        }
    }
    out
}

/// Percentile rank in `[0, 1]` across assets (ties share the average rank).
///
/// A row with a single finite value ranks it at 0.5.
pub fn cs_rank(x: ArrayView2<'_, f64>) -> Array2<f64> {
    map_rows(x, |row| {
        let ranks = average_ranks(row);
        let n = ranks.iter().filter(|r| r.is_finite()).count();
        for (dst, r) in row.iter_mut().zip(ranks) {
            *dst = match n {
                _ if !r.is_finite() => f64::NAN,
                1 => 0.5,
                _ => r / (n - 1) as f64,
            };
        }
    })
}

/// Z-score across assets (sample standard deviation).
pub fn cs_zscore(x: ArrayView2<'_, f64>) -> Array2<f64> {
    map_rows(x, |row| {
        standardize_inplace(row);
    })
}

/// Subtract the cross-sectional mean of finite values.
pub fn cs_demean(x: ArrayView2<'_, f64>) -> Array2<f64> {
    map_rows(x, |row| {
        let finite: Vec<f64> = row.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        for v in row.iter_mut() {
            *v -= mean;
        }
    })
}
