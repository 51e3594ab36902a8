//! Cross-symbol summaries: volatility tiers, group statistics and robustness tests

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::SymbolReport;
use crate::metrics::stats::{mean, percentile, sample_std};

/// Metrics summarised per group
pub const GROUP_METRICS: [&str; 6] = [
    "MAPE",
    "Direction_Accuracy",
    "Sharpe_Ratio",
    "Annual_Return",
    "Max_Drawdown",
    "Backtest_Win_Rate",
];

/// Metrics reported per robustness scenario
pub const ROBUSTNESS_METRICS: [&str; 3] = ["MAPE", "Direction_Accuracy", "Sharpe_Ratio"];

/// Annual return separating bull and bear regimes
pub const REGIME_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VolatilityTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for VolatilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityTier::Low => write!(f, "Low"),
            VolatilityTier::Medium => write!(f, "Medium"),
            VolatilityTier::High => write!(f, "High"),
        }
    }
}

/// Assign tertile tiers; non-finite values get no tier
pub fn volatility_tiers(volatilities: &[f64]) -> Vec<Option<VolatilityTier>> {
    let finite: Vec<f64> = volatilities
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return vec![None; volatilities.len()];
    }
    let low_cut = percentile(&finite, 100.0 / 3.0);
    let high_cut = percentile(&finite, 200.0 / 3.0);

    volatilities
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                None
            } else if v <= low_cut {
                Some(VolatilityTier::Low)
            } else if v <= high_cut {
                Some(VolatilityTier::Medium)
            } else {
                Some(VolatilityTier::High)
            }
        })
        .collect()
}

/// Grouping dimension of the summary tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    Market,
    MarketCap,
    Volatility,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Market, Dimension::MarketCap, Dimension::Volatility];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Market => write!(f, "Market"),
            Dimension::MarketCap => write!(f, "Market_Cap"),
            Dimension::Volatility => write!(f, "Volatility"),
        }
    }
}

/// Mean, sample std, min and max over the finite values of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        Self {
            mean: mean(&finite),
            std: sample_std(&finite),
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub group: String,
    pub count: usize,
    /// One entry per name in `GROUP_METRICS`
    pub stats: Vec<(String, MetricStats)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatistics {
    pub dimension: Dimension,
    pub rows: Vec<GroupRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobustnessResult {
    pub scenario: String,
    pub count: usize,
    pub mape: f64,
    pub direction_accuracy: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Outcome of a batch evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub reports: Vec<SymbolReport>,
    pub skipped: Vec<SkippedSymbol>,
    /// Tier of each report, aligned with `reports`
    pub volatility_tiers: Vec<Option<VolatilityTier>>,
    pub group_statistics: Vec<GroupStatistics>,
    pub robustness: Vec<RobustnessResult>,
}

impl EvaluationSummary {
    pub fn build(reports: Vec<SymbolReport>, skipped: Vec<SkippedSymbol>) -> Self {
        let vols: Vec<f64> = reports
            .iter()
            .map(|r| r.metric("Annual_Volatility"))
            .collect();
        let volatility_tiers = volatility_tiers(&vols);

        let mut summary = Self {
            reports,
            skipped,
            volatility_tiers,
            group_statistics: Vec::new(),
            robustness: Vec::new(),
        };
        summary.group_statistics = Dimension::ALL
            .iter()
            .map(|d| summary.group_statistics_for(*d))
            .collect();
        summary.robustness = summary.robustness_tests();
        summary
    }

    pub fn tier_of(&self, index: usize) -> Option<VolatilityTier> {
        self.volatility_tiers.get(index).copied().flatten()
    }

    /// Group label of the report at `index`, `None` when it has no tier
    pub fn label(&self, dimension: Dimension, index: usize) -> Option<String> {
        let report = &self.reports[index];
        match dimension {
            Dimension::Market => Some(report.market.clone()),
            Dimension::MarketCap => Some(report.cap_tier.clone()),
            Dimension::Volatility => self.tier_of(index).map(|t| t.to_string()),
        }
    }

    fn groups(&self, dimension: Dimension) -> BTreeMap<String, Vec<&SymbolReport>> {
        let mut groups: BTreeMap<String, Vec<&SymbolReport>> = BTreeMap::new();
        for (i, report) in self.reports.iter().enumerate() {
            if let Some(label) = self.label(dimension, i) {
                groups.entry(label).or_default().push(report);
            }
        }
        groups
    }

    fn group_statistics_for(&self, dimension: Dimension) -> GroupStatistics {
        let rows = self
            .groups(dimension)
            .into_iter()
            .map(|(group, members)| GroupRow {
                count: members.len(),
                stats: GROUP_METRICS
                    .iter()
                    .map(|name| {
                        let values: Vec<f64> = members.iter().map(|r| r.metric(name)).collect();
                        (name.to_string(), MetricStats::from_values(&values))
                    })
                    .collect(),
                group,
            })
            .collect();
        GroupStatistics { dimension, rows }
    }

    pub fn statistics(&self, dimension: Dimension) -> Option<&GroupStatistics> {
        self.group_statistics.iter().find(|g| g.dimension == dimension)
    }

    fn robustness_tests(&self) -> Vec<RobustnessResult> {
        let mut results = Vec::new();

        let regimes: [(&str, fn(f64) -> bool); 3] = [
            ("Bull_Market", |r| r > REGIME_THRESHOLD),
            ("Bear_Market", |r| r < -REGIME_THRESHOLD),
            ("Neutral_Market", |r| (-REGIME_THRESHOLD..=REGIME_THRESHOLD).contains(&r)),
        ];
        for (scenario, in_regime) in regimes {
            let members: Vec<&SymbolReport> = self
                .reports
                .iter()
                .filter(|r| in_regime(r.metric("Annual_Return")))
                .collect();
            if !members.is_empty() {
                results.push(robustness_row(scenario.to_string(), &members));
            }
        }

        for (tier, members) in self.groups(Dimension::Volatility) {
            results.push(robustness_row(format!("{}_Volatility", tier), &members));
        }
        for (tier, members) in self.groups(Dimension::MarketCap) {
            results.push(robustness_row(format!("{}_MarketCap", tier), &members));
        }

        results
    }
}

fn robustness_row(scenario: String, members: &[&SymbolReport]) -> RobustnessResult {
    let avg = |name: &str| {
        let values: Vec<f64> = members
            .iter()
            .map(|r| r.metric(name))
            .filter(|v| !v.is_nan())
            .collect();
        mean(&values)
    };
    RobustnessResult {
        scenario,
        count: members.len(),
        mape: avg(ROBUSTNESS_METRICS[0]),
        direction_accuracy: avg(ROBUSTNESS_METRICS[1]),
        sharpe_ratio: avg(ROBUSTNESS_METRICS[2]),
    }
}
