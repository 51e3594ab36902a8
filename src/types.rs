//! Core types used throughout fusion-eval
//!
//! Defines prediction rows, trade log entries and metric bundles.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EvalError, EvalResult};

/// One row of model output: realised value and the model's prediction for it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDateTime,
    pub actual: f64,
    pub predicted: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDateTime, actual: f64, predicted: f64) -> Self {
        Self {
            date,
            actual,
            predicted,
        }
    }

    /// True when either value is NaN
    pub fn has_nan(&self) -> bool {
        self.actual.is_nan() || self.predicted.is_nan()
    }

    /// True when both values are neither NaN nor infinite
    pub fn is_finite(&self) -> bool {
        self.actual.is_finite() && self.predicted.is_finite()
    }
}

/// How the `actual` column encodes the asset's movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnConvention {
    /// Column holds price levels; return = (a_i - a_{i-1}) / a_{i-1}
    PriceLevels,
    /// Column holds percent changes; return = a_i / 100
    PercentChange,
}

impl fmt::Display for ReturnConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnConvention::PriceLevels => write!(f, "price_levels"),
            ReturnConvention::PercentChange => write!(f, "percent_change"),
        }
    }
}

/// Running accumulator of a single backtest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioState {
    pub capital: f64,
    pub position: f64,
    pub cumulative_return: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            position: 0.0,
            cumulative_return: 0.0,
        }
    }
}

/// One simulated step of a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDateTime,
    /// Raw prediction that produced the position
    pub signal: f64,
    /// Target exposure held over the step
    pub position: f64,
    /// Canonical return of the underlying asset
    pub asset_return: f64,
    /// Transaction cost as a fraction of capital
    pub cost_fraction: f64,
    /// Transaction cost in currency
    pub cost_amount: f64,
    /// Net portfolio return of the step
    pub daily_return: f64,
    pub portfolio_value: f64,
    pub cumulative_return: f64,
}

impl TradeRecord {
    /// Gross strategy return before costs
    pub fn strategy_return(&self) -> f64 {
        self.position * self.asset_return
    }
}

/// Category of a metric in a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricGroup {
    Prediction,
    Statistical,
    Financial,
    Risk,
    Backtest,
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricGroup::Prediction => write!(f, "prediction"),
            MetricGroup::Statistical => write!(f, "statistical"),
            MetricGroup::Financial => write!(f, "financial"),
            MetricGroup::Risk => write!(f, "risk"),
            MetricGroup::Backtest => write!(f, "backtest"),
        }
    }
}

/// Named metric values, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    values: BTreeMap<String, f64>,
    #[serde(skip)]
    groups: BTreeMap<String, MetricGroup>,
}

impl MetricsBundle {
    pub fn builder() -> MetricsBundleBuilder {
        MetricsBundleBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn group_of(&self, name: &str) -> Option<MetricGroup> {
        self.groups.get(name).copied()
    }

    /// Metrics of one category, in name order
    pub fn group(&self, group: MetricGroup) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values
            .iter()
            .filter(move |(name, _)| self.groups.get(name.as_str()) == Some(&group))
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Combine two bundles; entries of `other` win on name clashes
    pub fn merged(mut self, other: MetricsBundle) -> MetricsBundle {
        self.values.extend(other.values);
        self.groups.extend(other.groups);
        self
    }
}

#[derive(Debug, Default)]
pub struct MetricsBundleBuilder {
    bundle: MetricsBundle,
}

impl MetricsBundleBuilder {
    pub fn insert(mut self, group: MetricGroup, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        self.bundle.groups.insert(name.clone(), group);
        self.bundle.values.insert(name, value);
        self
    }

    pub fn extend<'a>(
        mut self,
        group: MetricGroup,
        pairs: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Self {
        for (name, value) in pairs {
            self = self.insert(group, name, value);
        }
        self
    }

    pub fn build(self) -> MetricsBundle {
        self.bundle
    }
}

/// Shape checks shared by every consumer of a prediction table.
///
/// Rejects empty input, non-increasing dates and tables where more than half
/// of the rows carry a non-finite value. Returns the number of NaN rows
/// otherwise.
pub fn validate_series(points: &[PricePoint]) -> EvalResult<usize> {
    if points.is_empty() {
        return Err(EvalError::input("prediction table is empty"));
    }

    for (index, pair) in points.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(EvalError::DataOrdering {
                index: index + 1,
                previous: pair[0].date,
                current: pair[1].date,
            });
        }
    }

    let non_finite = points.iter().filter(|p| !p.is_finite()).count();
    if non_finite * 2 > points.len() {
        return Err(EvalError::input(format!(
            "{} of {} rows contain non-finite values",
            non_finite,
            points.len()
        )));
    }

    Ok(points.iter().filter(|p| p.has_nan()).count())
}

/// Shape check for paired metric inputs
pub fn ensure_paired(actual: &[f64], predicted: &[f64]) -> EvalResult<()> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(EvalError::input("actual/predicted arrays must be non-empty"));
    }
    if actual.len() != predicted.len() {
        return Err(EvalError::input(format!(
            "length mismatch: {} actual vs {} predicted",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}
