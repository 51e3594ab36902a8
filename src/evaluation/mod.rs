//! Batch model evaluation
//!
//! Runs every metric group and a backtest per symbol, then groups the results
//! by market, market cap and volatility tier. A symbol that cannot be
//! evaluated is skipped with a warning; the batch continues.

pub mod summary;

pub use summary::{
    volatility_tiers, Dimension, EvaluationSummary, GroupRow, GroupStatistics, MetricStats,
    RobustnessResult, SkippedSymbol, VolatilityTier, GROUP_METRICS,
};

use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backtesting::{
    benchmark_return, common_range, monthly_returns, to_steps, BacktestConfig, BacktestSummary,
    Backtester, BenchmarkPoint,
};
use crate::config::{AppConfig, UniverseConfig};
use crate::error::{EvalError, EvalResult};
use crate::metrics::{accuracy_bundle, performance_bundle, RollingMetrics};
use crate::types::{validate_series, MetricGroup, MetricsBundle, PricePoint, TradeRecord};

/// Supplies the model's prediction table for a symbol
#[cfg_attr(test, mockall::automock)]
pub trait PredictionSource: Send + Sync {
    /// `Ok(None)` when the symbol has no predictions
    fn fetch(&self, symbol: &str) -> anyhow::Result<Option<Vec<PricePoint>>>;
}

/// Scalars and tables the evaluator needs
#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub backtest: BacktestConfig,
    pub risk_free_rate: f64,
    pub confidence_level: f64,
    pub rolling_window: usize,
    pub universe: UniverseConfig,
    /// Buy-and-hold reference prices; empty disables the comparison
    pub benchmark: Vec<BenchmarkPoint>,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            backtest: BacktestConfig::default(),
            risk_free_rate: 0.02,
            confidence_level: 0.95,
            rolling_window: 252,
            universe: UniverseConfig::default(),
            benchmark: Vec::new(),
        }
    }
}

impl From<&AppConfig> for EvaluatorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            backtest: config.backtest,
            risk_free_rate: config.evaluation.risk_free_rate,
            confidence_level: config.evaluation.confidence_level,
            rolling_window: config.evaluation.rolling_window,
            universe: config.universe.clone(),
            benchmark: Vec::new(),
        }
    }
}

/// Everything computed for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub market: String,
    pub cap_tier: String,
    pub metrics: MetricsBundle,
    pub backtest: BacktestSummary,
    #[serde(skip)]
    pub trades: Vec<TradeRecord>,
    #[serde(skip)]
    pub rolling: RollingMetrics,
    /// Step date of each rolling entry
    #[serde(skip)]
    pub rolling_dates: Vec<NaiveDateTime>,
    pub monthly_returns: Vec<(String, f64)>,
}

impl SymbolReport {
    /// Metric by name, `NaN` when absent
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).unwrap_or(f64::NAN)
    }
}

/// Model evaluator
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    settings: Arc<EvaluatorSettings>,
}

impl ModelEvaluator {
    pub fn new(settings: EvaluatorSettings) -> EvalResult<Self> {
        settings.backtest.validate()?;
        settings.universe.validate()?;
        if !(settings.confidence_level > 0.0 && settings.confidence_level < 1.0) {
            return Err(EvalError::config(format!(
                "confidence_level must be in (0, 1), got {}",
                settings.confidence_level
            )));
        }
        if settings.rolling_window < 2 {
            return Err(EvalError::config(format!(
                "rolling_window must be at least 2, got {}",
                settings.rolling_window
            )));
        }
        Ok(Self {
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Evaluate one prediction table
    pub fn evaluate_symbol(&self, symbol: &str, points: &[PricePoint]) -> EvalResult<SymbolReport> {
        let settings = &self.settings;
        validate_series(points)?;

        let (actual, predicted): (Vec<f64>, Vec<f64>) = points
            .iter()
            .filter(|p| p.is_finite())
            .map(|p| (p.actual, p.predicted))
            .unzip();
        let accuracy = accuracy_bundle(&actual, &predicted)?;

        let (rolling_dates, returns): (Vec<NaiveDateTime>, Vec<f64>) =
            to_steps(points, settings.backtest.convention)?
                .into_iter()
                .filter(|s| s.asset_return.is_finite())
                .map(|s| (s.date, s.asset_return))
                .unzip();
        let performance = performance_bundle(
            &returns,
            settings.risk_free_rate,
            settings.confidence_level,
        )?;
        let rolling = RollingMetrics::compute(&returns, settings.rolling_window)?;

        let mut backtester = Backtester::new(settings.backtest)?;
        let backtest = backtester.run(points)?;
        let trades = backtester.get_trades().to_vec();

        let metrics = accuracy
            .merged(performance)
            .merged(backtest.to_bundle())
            .merged(self.benchmark_bundle(symbol, points));

        let report = SymbolReport {
            symbol: symbol.to_string(),
            market: settings.universe.market_for(symbol).to_string(),
            cap_tier: settings.universe.cap_tier(symbol).to_string(),
            monthly_returns: monthly_returns(&trades),
            metrics,
            backtest,
            trades,
            rolling,
            rolling_dates,
        };

        info!(
            symbol = %report.symbol,
            market = %report.market,
            rows = points.len(),
            mape = report.metric("MAPE"),
            direction_accuracy = report.metric("Direction_Accuracy"),
            backtest_return = report.backtest.total_return,
            "Symbol evaluated"
        );

        Ok(report)
    }

    /// Benchmark buy-and-hold over the symbol's date range
    fn benchmark_bundle(&self, symbol: &str, points: &[PricePoint]) -> MetricsBundle {
        let benchmark = &self.settings.benchmark;
        if benchmark.is_empty() {
            return MetricsBundle::builder().build();
        }

        let range = match (common_range(&[points]), common_range(&[&benchmark[..]])) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) if a_lo.max(b_lo) <= a_hi.min(b_hi) => {
                (a_lo.max(b_lo), a_hi.min(b_hi))
            }
            _ => {
                warn!(symbol = %symbol, "Benchmark does not overlap prediction dates");
                return MetricsBundle::builder().build();
            }
        };

        match benchmark_return(benchmark, range) {
            Ok(bench) => MetricsBundle::builder()
                .insert(MetricGroup::Backtest, "Benchmark_Total_Return", bench.total_return)
                .insert(MetricGroup::Backtest, "Benchmark_Annual_Return", bench.annual_return)
                .build(),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Benchmark return unavailable");
                MetricsBundle::builder().build()
            }
        }
    }

    /// Fetch and evaluate one symbol, turning every failure into a skip reason
    fn evaluate_source(
        &self,
        source: &dyn PredictionSource,
        symbol: &str,
    ) -> Result<SymbolReport, String> {
        let points = match source.fetch(symbol) {
            Ok(Some(points)) => points,
            Ok(None) => return Err("no predictions".to_string()),
            Err(e) => return Err(format!("{:#}", e)),
        };
        self.evaluate_symbol(symbol, &points).map_err(|e| e.to_string())
    }

    /// Evaluate symbols one after another
    pub fn evaluate(&self, source: &dyn PredictionSource, symbols: &[String]) -> EvaluationSummary {
        let mut reports = Vec::new();
        let mut skipped = Vec::new();

        for symbol in symbols {
            match self.evaluate_source(source, symbol) {
                Ok(report) => reports.push(report),
                Err(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "Skipping symbol");
                    skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason,
                    });
                }
            }
        }

        EvaluationSummary::build(reports, skipped)
    }

    /// Evaluate symbols in parallel on the blocking pool.
    ///
    /// Reports come back in the order of `symbols`.
    pub async fn evaluate_concurrent(
        &self,
        source: Arc<dyn PredictionSource>,
        symbols: &[String],
    ) -> EvaluationSummary {
        let handles: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                let evaluator = self.clone();
                let source = Arc::clone(&source);
                let symbol = symbol.clone();
                tokio::task::spawn_blocking(move || {
                    evaluator.evaluate_source(source.as_ref(), &symbol)
                })
            })
            .collect();

        let mut reports = Vec::new();
        let mut skipped = Vec::new();

        for (symbol, handle) in symbols.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("evaluation task failed: {}", e)),
            };
            match outcome {
                Ok(report) => reports.push(report),
                Err(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "Skipping symbol");
                    skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason,
                    });
                }
            }
        }

        EvaluationSummary::build(reports, skipped)
    }
}
