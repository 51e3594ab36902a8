//! Statistical-significance metrics
//!
//! - Diebold-Mariano style comparison against the naive previous-value forecast
//! - Pearson correlation with its p-value
//! - Residual autocorrelation

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::stats::{mean, sample_std, t_two_sided_p};
use crate::error::EvalResult;
use crate::types::ensure_paired;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalMetrics {
    pub dm_statistic: f64,
    pub dm_pvalue: f64,
    pub correlation: f64,
    pub correlation_pvalue: f64,
    pub acf_1: f64,
    pub acf_5: f64,
}

impl StatisticalMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> EvalResult<Self> {
        ensure_paired(actual, predicted)?;

        // Aligned on t >= 1 so both forecasts have an error
        let model_errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .skip(1)
            .map(|(a, p)| a - p)
            .collect();
        let loss_diff: Vec<f64> = actual
            .windows(2)
            .zip(&model_errors)
            .map(|(w, e)| (w[1] - w[0]).powi(2) - e.powi(2))
            .collect();

        let (dm_statistic, dm_pvalue) = one_sample_t_test(&loss_diff, 0.0);
        let (correlation, correlation_pvalue) = pearson(actual, predicted);

        Ok(Self {
            dm_statistic,
            dm_pvalue,
            correlation,
            correlation_pvalue,
            acf_1: autocorrelation(&model_errors, 1),
            acf_5: autocorrelation(&model_errors, 5),
        })
    }

    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("DM_Statistic", self.dm_statistic),
            ("DM_PValue", self.dm_pvalue),
            ("Correlation", self.correlation),
            ("Correlation_PValue", self.correlation_pvalue),
            ("ACF_1", self.acf_1),
            ("ACF_5", self.acf_5),
        ]
    }
}

/// Returns `(t, two-sided p)`; both `NaN` when the sample is degenerate
pub fn one_sample_t_test(sample: &[f64], popmean: f64) -> (f64, f64) {
    let n = sample.len();
    if n < 2 {
        warn!(n, "t-test needs at least two observations");
        return (f64::NAN, f64::NAN);
    }
    let sd = sample_std(sample);
    if sd == 0.0 {
        warn!("t-test undefined: zero variance in loss differential");
        return (f64::NAN, f64::NAN);
    }
    let t = (mean(sample) - popmean) / (sd / (n as f64).sqrt());
    (t, t_two_sided_p(t, (n - 1) as f64))
}

/// Pearson correlation and its two-sided p-value
pub fn pearson(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len();
    if n < 2 || n != y.len() {
        return (f64::NAN, f64::NAN);
    }
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        warn!("correlation undefined: constant input");
        return (f64::NAN, f64::NAN);
    }

    let r = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    if n < 3 {
        return (r, f64::NAN);
    }
    let p = if 1.0 - r.abs() < 1e-12 {
        0.0
    } else {
        let dof = (n - 2) as f64;
        let t = r * (dof / (1.0 - r * r)).sqrt();
        t_two_sided_p(t, dof)
    };
    (r, p)
}

/// Raw (non-demeaned) autocorrelation at `lag`, normalised by the series
/// length. `NaN` when the series is too short for the lag.
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    let n = series.len();
    if lag >= n {
        return f64::NAN;
    }
    let sum: f64 = series[..n - lag]
        .iter()
        .zip(&series[lag..])
        .map(|(a, b)| a * b)
        .sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autocorrelation_short_series() {
        assert!(autocorrelation(&[1.0, 2.0, 3.0], 5).is_nan());
        assert!((autocorrelation(&[1.0, 2.0, 3.0], 1) - 8.0 / 3.0).abs() < 1e-12);
        assert!((autocorrelation(&[1.0, 2.0, 3.0], 0) - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_perfect_linear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let (r, p) = pearson(&x, &y);
        assert!((r - 1.0).abs() < 1e-12);
        assert!(p < 1e-12);
    }

    #[test]
    fn test_t_test_symmetric_sample() {
        let (t, p) = one_sample_t_test(&[-1.0, 1.0, -2.0, 2.0], 0.0);
        assert_eq!(t, 0.0);
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_beating_naive_gives_positive_dm() {
        let actual = [100.0, 103.0, 101.0, 106.0, 104.0, 109.0, 107.0];
        let predicted = [100.0, 102.8, 101.3, 105.7, 104.1, 108.6, 107.2];
        let m = StatisticalMetrics::compute(&actual, &predicted).unwrap();
        assert!(m.dm_statistic > 0.0);
        assert!(m.dm_pvalue < 0.05);
        assert!(m.correlation > 0.9);
        assert!(m.acf_1.is_finite());
        assert!(m.acf_5.is_finite());
    }

    #[test]
    fn test_short_series_acf5_nan() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.1, 1.9, 3.2, 3.9];
        let m = StatisticalMetrics::compute(&actual, &predicted).unwrap();
        assert!(m.acf_1.is_finite());
        assert!(m.acf_5.is_nan());
    }
}
