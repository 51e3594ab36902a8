//! Tail and distribution-shape risk metrics

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::stats::{central_moment, mean, percentile, population_std};
use super::TRADING_DAYS;
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub var: f64,
    pub cvar: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0)
    pub kurtosis: f64,
    pub upside_volatility: f64,
    pub downside_volatility: f64,
}

impl RiskMetrics {
    pub fn compute(returns: &[f64], confidence_level: f64) -> EvalResult<Self> {
        if returns.is_empty() {
            return Err(EvalError::input("return series is empty"));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(EvalError::input(format!(
                "confidence level {} outside (0, 1)",
                confidence_level
            )));
        }

        let var = percentile(returns, (1.0 - confidence_level) * 100.0);
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
        let cvar = mean(&tail);

        let m2 = central_moment(returns, 2);
        let (skewness, kurtosis) = if m2 == 0.0 {
            warn!("skewness/kurtosis undefined: zero variance");
            (f64::NAN, f64::NAN)
        } else {
            (
                central_moment(returns, 3) / m2.powf(1.5),
                central_moment(returns, 4) / (m2 * m2) - 3.0,
            )
        };

        let upside: Vec<f64> = returns.iter().map(|r| r.max(0.0)).collect();
        let downside: Vec<f64> = returns.iter().map(|r| r.min(0.0)).collect();

        Ok(Self {
            var,
            cvar,
            skewness,
            kurtosis,
            upside_volatility: population_std(&upside) * TRADING_DAYS.sqrt(),
            downside_volatility: population_std(&downside) * TRADING_DAYS.sqrt(),
        })
    }

    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("VaR", self.var),
            ("CVaR", self.cvar),
            ("Skewness", self.skewness),
            ("Kurtosis", self.kurtosis),
            ("Upside_Volatility", self.upside_volatility),
            ("Downside_Volatility", self.downside_volatility),
        ]
    }
}
