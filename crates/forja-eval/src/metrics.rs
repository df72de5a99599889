//! Aggregate metrics over an IC time series.

use forja_traits::stats::{MIN_STD_THRESHOLD, finite_mean_std};
use serde::{Deserialize, Serialize};

/// Information Ratio: mean IC divided by the standard deviation of IC.
///
/// IR measures the consistency of a factor's predictive power. It is not
/// annualized; a series without dispersion has an IR of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationRatio {
    /// Mean IC
    pub mean_ic: f64,
    /// Sample standard deviation of IC
    pub std_ic: f64,
    /// Information Ratio
    pub ir: f64,
    /// Number of finite observations
    pub n_obs: usize,
}

impl InformationRatio {
    /// Calculate the Information Ratio from an IC series, ignoring NaN rows.
    ///
    /// # Example
    ///
    /// ```
    /// use forja_eval::InformationRatio;
    ///
    /// let ir = InformationRatio::calculate(&[0.05, 0.03, 0.07, f64::NAN]);
    /// assert_eq!(ir.n_obs, 3);
    /// assert!(ir.ir > 0.0);
    /// ```
    pub fn calculate(ic_series: &[f64]) -> Self {
        let valid: Vec<f64> = ic_series.iter().copied().filter(|x| x.is_finite()).collect();
        let n_obs = valid.len();

        match n_obs {
            0 => Self {
                mean_ic: f64::NAN,
                std_ic: f64::NAN,
                ir: f64::NAN,
                n_obs,
            },
            1 => Self {
                mean_ic: valid[0],
                std_ic: 0.0,
                ir: 0.0,
                n_obs,
            },
            _ => {
                let (mean_ic, std_ic) = finite_mean_std(valid.iter().copied()).unwrap_or((0.0, 0.0));
                let ir = if std_ic > MIN_STD_THRESHOLD {
                    mean_ic / std_ic
                } else {
                    0.0
                };
                Self {
                    mean_ic,
                    std_ic,
                    ir,
                    n_obs,
                }
            }
        }
    }
}

/// Mean of the finite values; NaN when there are none.
pub fn finite_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}
