//! Metrics Calculator
//!
//! Stateless metric groups computed from actual/predicted arrays and return
//! series:
//! - Prediction accuracy (MSE, RMSE, MAE, MAPE, R2, direction accuracy)
//! - Statistical significance (Diebold-Mariano, Pearson, residual ACF)
//! - Financial performance (annualised return/volatility, Sharpe, Sortino,
//!   max drawdown, Calmar)
//! - Risk (VaR, CVaR, skewness, kurtosis, one-sided volatility)
//! - Rolling-window views

pub mod financial;
pub mod prediction;
pub mod risk;
pub mod rolling;
pub mod statistical;
pub mod stats;

pub use financial::{max_drawdown, sharpe, wealth_index, FinancialMetrics};
pub use prediction::{direction_accuracy, PredictionMetrics};
pub use risk::RiskMetrics;
pub use rolling::RollingMetrics;
pub use statistical::{autocorrelation, StatisticalMetrics};

use crate::error::EvalResult;
use crate::types::{MetricGroup, MetricsBundle};

/// Zero-denominator guard shared by every ratio
pub const EPSILON: f64 = 1e-6;

/// Periods per year used for annualisation
pub const TRADING_DAYS: f64 = 252.0;

/// Prediction and statistical groups for a pair of aligned series
pub fn accuracy_bundle(actual: &[f64], predicted: &[f64]) -> EvalResult<MetricsBundle> {
    let prediction = PredictionMetrics::compute(actual, predicted)?;
    let statistical = StatisticalMetrics::compute(actual, predicted)?;

    Ok(MetricsBundle::builder()
        .extend(MetricGroup::Prediction, prediction.pairs())
        .extend(MetricGroup::Statistical, statistical.pairs())
        .build())
}

/// Financial and risk groups for a return series
pub fn performance_bundle(
    returns: &[f64],
    risk_free_rate: f64,
    confidence_level: f64,
) -> EvalResult<MetricsBundle> {
    let financial = FinancialMetrics::compute(returns, risk_free_rate)?;
    let risk = RiskMetrics::compute(returns, confidence_level)?;

    Ok(MetricsBundle::builder()
        .extend(MetricGroup::Financial, financial.pairs())
        .extend(MetricGroup::Risk, risk.pairs())
        .build())
}
