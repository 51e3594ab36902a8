//! Prediction-accuracy metrics

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::stats::{mean, sign};
use crate::error::EvalResult;
use crate::types::ensure_paired;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    pub r2: f64,
    /// Share of matching move directions, in percent
    pub direction_accuracy: f64,
}

impl PredictionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> EvalResult<Self> {
        ensure_paired(actual, predicted)?;

        let errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect();

        let mse = mean(&errors.iter().map(|e| e * e).collect::<Vec<_>>());
        let mae = mean(&errors.iter().map(|e| e.abs()).collect::<Vec<_>>());

        let mape = if actual.iter().any(|a| *a == 0.0) {
            warn!("MAPE undefined: actual series contains zero");
            f64::NAN
        } else {
            let ape: Vec<f64> = errors
                .iter()
                .zip(actual)
                .map(|(e, a)| e.abs() / a.abs())
                .collect();
            mean(&ape) * 100.0
        };

        let actual_mean = mean(actual);
        let ss_total: f64 = actual.iter().map(|a| (a - actual_mean).powi(2)).sum();
        let ss_residual: f64 = errors.iter().map(|e| e * e).sum();
        let r2 = if ss_total == 0.0 {
            warn!("R2 undefined: actual series has zero variance");
            f64::NAN
        } else {
            1.0 - ss_residual / ss_total
        };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            mape,
            r2,
            direction_accuracy: direction_accuracy(actual, predicted),
        })
    }

    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("MSE", self.mse),
            ("RMSE", self.rmse),
            ("MAE", self.mae),
            ("MAPE", self.mape),
            ("R2", self.r2),
            ("Direction_Accuracy", self.direction_accuracy),
        ]
    }
}

/// Percentage of consecutive moves whose direction the prediction got right.
/// Flat moves only match flat moves. `NaN` with fewer than two points.
pub fn direction_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() < 2 || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let hits = actual
        .windows(2)
        .zip(predicted.windows(2))
        .filter(|(a, p)| sign(a[1] - a[0]) == sign(p[1] - p[0]))
        .count();
    hits as f64 / (actual.len() - 1) as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    #[test]
    fn test_perfect_predictor() {
        let actual = [100.0, 110.0, 121.0, 108.9];
        let m = PredictionMetrics::compute(&actual, &actual).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.direction_accuracy, 100.0);
    }

    #[test]
    fn test_known_errors() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.5, 2.5, 2.5, 4.5];
        let m = PredictionMetrics::compute(&actual, &predicted).unwrap();
        assert!((m.mse - 0.25).abs() < 1e-12);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.5).abs() < 1e-12);
        // moves: actual up,up,up; predicted up,flat,up
        assert!((m.direction_accuracy - 200.0 / 3.0).abs() < 1e-9);
        assert!((m.r2 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_mape_guarded_on_zero_actual() {
        let m = PredictionMetrics::compute(&[0.0, 1.0], &[0.1, 1.0]).unwrap();
        assert!(m.mape.is_nan());
        assert!(m.mae.is_finite());
    }

    #[test]
    fn test_r2_nan_on_flat_actual() {
        let m = PredictionMetrics::compute(&[5.0, 5.0, 5.0], &[5.0, 4.0, 6.0]).unwrap();
        assert!(m.r2.is_nan());
    }

    #[test]
    fn test_direction_accuracy_needs_two_points() {
        let m = PredictionMetrics::compute(&[5.0], &[4.0]).unwrap();
        assert!(m.direction_accuracy.is_nan());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = PredictionMetrics::compute(&[1.0, 2.0], &[1.0]);
        assert!(matches!(result, Err(EvalError::InputValidation(_))));
    }
}
