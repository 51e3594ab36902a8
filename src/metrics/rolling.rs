//! Rolling-window views of a return series
//!
//! Each series has the same length as the input; positions before the first
//! full window are `NaN`.

use serde::{Deserialize, Serialize};

use super::financial::wealth_index;
use super::stats::{mean, sample_std};
use super::{EPSILON, TRADING_DAYS};
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingMetrics {
    pub window: usize,
    pub sharpe: Vec<f64>,
    pub volatility: Vec<f64>,
    /// Worst `wealth / peak - 1` inside each window (non-positive)
    pub max_drawdown: Vec<f64>,
}

impl RollingMetrics {
    pub fn compute(returns: &[f64], window: usize) -> EvalResult<Self> {
        if window < 2 {
            return Err(EvalError::input(format!(
                "rolling window must be at least 2, got {}",
                window
            )));
        }

        let sharpe = rolling(returns, window, |w| {
            mean(w) / (sample_std(w) + EPSILON) * TRADING_DAYS.sqrt()
        });
        let volatility = rolling(returns, window, |w| sample_std(w) * TRADING_DAYS.sqrt());
        let max_drawdown = rolling(returns, window, window_drawdown);

        Ok(Self {
            window,
            sharpe,
            volatility,
            max_drawdown,
        })
    }

    /// Last fully populated values, if the series is longer than the window
    pub fn latest(&self) -> Option<(f64, f64, f64)> {
        match (
            self.sharpe.last(),
            self.volatility.last(),
            self.max_drawdown.last(),
        ) {
            (Some(s), Some(v), Some(d)) if !s.is_nan() => Some((*s, *v, *d)),
            _ => None,
        }
    }
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if values.len() >= window {
        for (end, slice) in values.windows(window).enumerate() {
            out[end + window - 1] = f(slice);
        }
    }
    out
}

fn window_drawdown(returns: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for value in wealth_index(returns) {
        peak = peak.max(value);
        worst = worst.min(value / peak - 1.0);
    }
    worst
}
