//! Financial performance metrics over a return series
//!
//! All figures are annualised with `TRADING_DAYS` periods per year and use
//! `EPSILON` as the zero-denominator guard.

use serde::{Deserialize, Serialize};

use super::stats::{mean, population_std};
use super::{EPSILON, TRADING_DAYS};
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
}

impl FinancialMetrics {
    pub fn compute(returns: &[f64], risk_free_rate: f64) -> EvalResult<Self> {
        if returns.is_empty() {
            return Err(EvalError::input("return series is empty"));
        }

        let annual_return = mean(returns) * TRADING_DAYS;
        let annual_volatility = population_std(returns) * TRADING_DAYS.sqrt();

        let daily_rf = risk_free_rate / TRADING_DAYS;
        let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
        let sharpe_ratio = sharpe(&excess);

        let downside: Vec<f64> = returns.iter().map(|r| r.min(0.0)).collect();
        let downside_vol = population_std(&downside) * TRADING_DAYS.sqrt();
        let sortino_ratio = mean(&excess) * TRADING_DAYS / (downside_vol + EPSILON);

        let max_drawdown = max_drawdown(&wealth_index(returns));
        let calmar_ratio = annual_return / (max_drawdown + EPSILON);

        Ok(Self {
            annual_return,
            annual_volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            calmar_ratio,
        })
    }

    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("Annual_Return", self.annual_return),
            ("Annual_Volatility", self.annual_volatility),
            ("Sharpe_Ratio", self.sharpe_ratio),
            ("Sortino_Ratio", self.sortino_ratio),
            ("Max_Drawdown", self.max_drawdown),
            ("Calmar_Ratio", self.calmar_ratio),
        ]
    }
}

/// Annualised Sharpe of an (excess) return series
pub fn sharpe(returns: &[f64]) -> f64 {
    mean(returns) / (population_std(returns) + EPSILON) * TRADING_DAYS.sqrt()
}

/// Compounded growth of one unit of capital, starting at 1.0
pub fn wealth_index(returns: &[f64]) -> Vec<f64> {
    std::iter::once(1.0)
        .chain(returns.iter().scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        }))
        .collect()
}

/// Largest peak-to-trough decline of a value curve, as a positive fraction
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd: f64 = 0.0;

    for &value in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_returns_rejected() {
        assert!(matches!(
            FinancialMetrics::compute(&[], 0.02),
            Err(EvalError::InputValidation(_))
        ));
    }

    #[test]
    fn test_monotonic_curve_has_no_drawdown() {
        let curve = [1.0, 1.01, 1.05, 1.05, 1.2];
        assert_eq!(max_drawdown(&curve), 0.0);

        let m = FinancialMetrics::compute(&[0.01, 0.02, 0.0, 0.03], 0.0).unwrap();
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_drawdown_value() {
        let curve = [100.0, 110.0, 105.0, 120.0, 90.0];
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_scale_invariant() {
        let returns = [120.0, -80.0, 250.0, 30.0, -40.0, 90.0];
        let scaled: Vec<f64> = returns.iter().map(|r| r * 3.0).collect();
        let a = FinancialMetrics::compute(&returns, 0.0).unwrap().sharpe_ratio;
        let b = FinancialMetrics::compute(&scaled, 0.0).unwrap().sharpe_ratio;
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    }

    #[test]
    fn test_sortino_uses_excess_returns() {
        let returns = [0.01, -0.02, 0.015, -0.005, 0.02, -0.01];
        let base = FinancialMetrics::compute(&returns, 0.0).unwrap();
        let with_rf = FinancialMetrics::compute(&returns, 0.5).unwrap();
        assert!(with_rf.sortino_ratio < base.sortino_ratio);

        let daily_rf = 0.5 / TRADING_DAYS;
        let downside: Vec<f64> = returns.iter().map(|r| r.min(0.0)).collect();
        let expected = (mean(&returns) - daily_rf) * TRADING_DAYS
            / (population_std(&downside) * TRADING_DAYS.sqrt() + EPSILON);
        assert!((with_rf.sortino_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn test_first_period_loss_counts_as_drawdown() {
        assert_eq!(wealth_index(&[0.1]), vec![1.0, 1.1]);

        let m = FinancialMetrics::compute(&[-0.5, 0.1], 0.0).unwrap();
        assert!((m.max_drawdown - 0.5).abs() < 1e-12);
        assert!(m.calmar_ratio.abs() < 1e3);
    }

    #[test]
    fn test_annualisation() {
        let returns = [0.001; 10];
        let m = FinancialMetrics::compute(&returns, 0.0).unwrap();
        assert!((m.annual_return - 0.252).abs() < 1e-12);
        assert!(m.annual_volatility.abs() < 1e-12);
        // zero volatility is caught by the epsilon guard
        assert!(m.sharpe_ratio.is_finite());
        assert!(m.calmar_ratio.is_finite());
    }
}
