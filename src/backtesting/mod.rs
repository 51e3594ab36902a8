//! Backtesting Module
//!
//! Replays model predictions against realised returns:
//! - One simulation loop, parameterised by a position sizer, a cost model
//!   and a cost timing
//! - Continuous (sigmoid-sized) and direction-only presets
//! - Summary statistics, monthly returns and benchmark curves

pub mod benchmark;

pub use benchmark::{
    benchmark_curve, benchmark_return, clip_to_range, common_range, BenchmarkPoint,
    BenchmarkReturn, Dated,
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{EvalError, EvalResult};
use crate::metrics::stats::{mean, population_std, sample_std};
use crate::metrics::{max_drawdown, sharpe, TRADING_DAYS};
use crate::risk::{
    CostModel, CostTiming, DirectionalSizer, PerTradeCost, PositionSizer, ProportionalCost,
    SigmoidSizer,
};
use crate::types::{
    validate_series, MetricGroup, MetricsBundle, PortfolioState, PricePoint, ReturnConvention,
    TradeRecord,
};

/// Preset pairing of sizer, cost model and cost timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestMode {
    /// Sigmoid-sized position, cost proportional to |position change|,
    /// deducted from the step's return
    Continuous,
    /// Long/flat on predicted direction, flat cost per position flip,
    /// deducted from capital
    DirectionOnly,
}

impl fmt::Display for BacktestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestMode::Continuous => write!(f, "continuous"),
            BacktestMode::DirectionOnly => write!(f, "direction_only"),
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Initial capital
    pub initial_capital: f64,
    /// Transaction cost rate (fraction)
    pub transaction_cost: f64,
    /// Largest absolute exposure
    pub max_position: f64,
    pub mode: BacktestMode,
    /// Encoding of the `actual` column
    pub convention: ReturnConvention,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self::direction_only()
    }
}

impl BacktestConfig {
    /// Long/flat engine on price levels
    pub fn direction_only() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            transaction_cost: 0.001,
            max_position: 1.0,
            mode: BacktestMode::DirectionOnly,
            convention: ReturnConvention::PriceLevels,
        }
    }

    /// Sigmoid-sized engine on percent-change targets
    pub fn continuous() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            transaction_cost: 0.002,
            max_position: 0.5,
            mode: BacktestMode::Continuous,
            convention: ReturnConvention::PercentChange,
        }
    }

    pub fn validate(&self) -> EvalResult<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EvalError::config(format!(
                "initial_capital must be > 0, got {}",
                self.initial_capital
            )));
        }
        if !(self.transaction_cost >= 0.0 && self.transaction_cost < 1.0) {
            return Err(EvalError::config(format!(
                "transaction_cost must be in [0, 1), got {}",
                self.transaction_cost
            )));
        }
        if !(self.max_position > 0.0 && self.max_position <= 1.0) {
            return Err(EvalError::config(format!(
                "max_position must be in (0, 1], got {}",
                self.max_position
            )));
        }
        Ok(())
    }
}

/// One simulation step after return conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub date: NaiveDateTime,
    pub prediction: f64,
    pub previous_prediction: Option<f64>,
    /// Canonical fractional return of the asset over the step
    pub asset_return: f64,
}

/// Convert a prediction table into simulation steps.
///
/// With `PriceLevels` the first row is only the reference price, so the
/// result has one step fewer than the input.
pub fn to_steps(points: &[PricePoint], convention: ReturnConvention) -> EvalResult<Vec<Step>> {
    match convention {
        ReturnConvention::PercentChange => Ok(points
            .iter()
            .enumerate()
            .map(|(i, p)| Step {
                date: p.date,
                prediction: p.predicted,
                previous_prediction: i.checked_sub(1).map(|j| points[j].predicted),
                asset_return: p.actual / 100.0,
            })
            .collect()),
        ReturnConvention::PriceLevels => points
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                if w[0].actual == 0.0 {
                    return Err(EvalError::DivisionByZero { index: i });
                }
                Ok(Step {
                    date: w[1].date,
                    prediction: w[1].predicted,
                    previous_prediction: Some(w[0].predicted),
                    asset_return: (w[1].actual - w[0].actual) / w[0].actual,
                })
            })
            .collect(),
    }
}

/// Backtest summary statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub final_portfolio: f64,
    pub total_return: f64,
    /// Mean net step return * 252
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline of portfolio value
    pub max_drawdown: f64,
    /// Share of steps with a positive gross strategy return
    pub win_rate: f64,
    /// Steps on which the position changed
    pub trade_count: usize,
    /// Sum of cost fractions
    pub total_cost: f64,
    pub total_cost_amount: f64,
    /// Compound annual growth over the calendar span
    pub cagr: f64,
    pub avg_abs_position: f64,
    pub position_std: f64,
    pub steps: usize,
    pub nan_rows: usize,
}

impl BacktestSummary {
    pub fn to_bundle(&self) -> MetricsBundle {
        let g = MetricGroup::Backtest;
        MetricsBundle::builder()
            .insert(g, "Backtest_Final_Portfolio", self.final_portfolio)
            .insert(g, "Backtest_Total_Return", self.total_return)
            .insert(g, "Backtest_Annual_Return", self.annual_return)
            .insert(g, "Backtest_Annual_Volatility", self.annual_volatility)
            .insert(g, "Backtest_Sharpe_Ratio", self.sharpe_ratio)
            .insert(g, "Backtest_Max_Drawdown", self.max_drawdown)
            .insert(g, "Backtest_Win_Rate", self.win_rate)
            .insert(g, "Backtest_Trade_Count", self.trade_count as f64)
            .insert(g, "Backtest_Total_Cost", self.total_cost)
            .insert(g, "Backtest_CAGR", self.cagr)
            .insert(g, "Backtest_Avg_Position", self.avg_abs_position)
            .insert(g, "Backtest_NaN_Rows", self.nan_rows as f64)
            .build()
    }
}

/// Backtester
pub struct Backtester {
    config: BacktestConfig,
    sizer: Box<dyn PositionSizer>,
    cost_model: Box<dyn CostModel>,
    timing: CostTiming,
    /// Executed steps
    trades: Vec<TradeRecord>,
    /// Portfolio value, starting with the initial capital
    equity_curve: Vec<f64>,
    nan_rows: usize,
}

impl Backtester {
    /// Backtester for one of the preset modes
    pub fn new(config: BacktestConfig) -> EvalResult<Self> {
        let (sizer, cost_model, timing): (Box<dyn PositionSizer>, Box<dyn CostModel>, _) =
            match config.mode {
                BacktestMode::Continuous => (
                    Box::new(SigmoidSizer::new(config.max_position)),
                    Box::new(ProportionalCost {
                        rate: config.transaction_cost,
                    }),
                    CostTiming::FromReturn,
                ),
                BacktestMode::DirectionOnly => (
                    Box::new(DirectionalSizer::new(config.max_position)),
                    Box::new(PerTradeCost {
                        rate: config.transaction_cost,
                    }),
                    CostTiming::FromCapital,
                ),
            };
        Self::with_strategy(config, sizer, cost_model, timing)
    }

    /// Backtester with a custom sizer / cost pairing
    pub fn with_strategy(
        config: BacktestConfig,
        sizer: Box<dyn PositionSizer>,
        cost_model: Box<dyn CostModel>,
        timing: CostTiming,
    ) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sizer,
            cost_model,
            timing,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            nan_rows: 0,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run backtest
    pub fn run(&mut self, points: &[PricePoint]) -> EvalResult<BacktestSummary> {
        self.nan_rows = validate_series(points)?;
        if self.nan_rows > 0 {
            warn!(
                nan_rows = self.nan_rows,
                "NaN rows in prediction table, values will propagate"
            );
        }

        let steps = to_steps(points, self.config.convention)?;
        if steps.is_empty() {
            return Err(EvalError::input(
                "price-level returns need at least two rows",
            ));
        }

        self.trades.clear();
        self.equity_curve.clear();

        let max_position = self.config.max_position;
        let mut state = PortfolioState::new(self.config.initial_capital);
        self.equity_curve.push(state.capital);

        for step in &steps {
            let target = self
                .sizer
                .target_position(step.previous_prediction, step.prediction)
                .clamp(-max_position, max_position);
            let cost_fraction = self.cost_model.cost_fraction(state.position, target);
            let gross = target * step.asset_return;

            let daily_return = match self.timing {
                CostTiming::FromReturn => gross - cost_fraction,
                CostTiming::FromCapital => (1.0 - cost_fraction) * (1.0 + gross) - 1.0,
            };

            let prior_capital = state.capital;
            state.capital = prior_capital * (1.0 + daily_return);
            state.position = target;
            state.cumulative_return = (1.0 + state.cumulative_return) * (1.0 + daily_return) - 1.0;

            self.trades.push(TradeRecord {
                date: step.date,
                signal: step.prediction,
                position: target,
                asset_return: step.asset_return,
                cost_fraction,
                cost_amount: cost_fraction * prior_capital,
                daily_return,
                portfolio_value: state.capital,
                cumulative_return: state.cumulative_return,
            });
            self.equity_curve.push(state.capital);
        }

        let summary = self.calculate_summary();
        debug!(
            mode = %self.config.mode,
            steps = summary.steps,
            trades = summary.trade_count,
            total_return = summary.total_return,
            "Backtest finished"
        );
        Ok(summary)
    }

    /// Calculate summary statistics from the recorded steps
    pub fn calculate_summary(&self) -> BacktestSummary {
        let initial = self.config.initial_capital;
        let final_portfolio = self.equity_curve.last().copied().unwrap_or(initial);
        let returns: Vec<f64> = self.trades.iter().map(|t| t.daily_return).collect();
        let positions: Vec<f64> = self.trades.iter().map(|t| t.position).collect();

        let mut previous = 0.0;
        let mut trade_count = 0;
        for &p in &positions {
            if p != previous {
                trade_count += 1;
            }
            previous = p;
        }

        let win_rate = if self.trades.is_empty() {
            0.0
        } else {
            let wins = self
                .trades
                .iter()
                .filter(|t| t.strategy_return() > 0.0)
                .count();
            wins as f64 / self.trades.len() as f64
        };

        BacktestSummary {
            final_portfolio,
            total_return: (final_portfolio - initial) / initial,
            annual_return: mean(&returns) * TRADING_DAYS,
            annual_volatility: population_std(&returns) * TRADING_DAYS.sqrt(),
            sharpe_ratio: sharpe(&returns),
            max_drawdown: max_drawdown(&self.equity_curve),
            win_rate,
            trade_count,
            total_cost: self.trades.iter().map(|t| t.cost_fraction).sum(),
            total_cost_amount: self.trades.iter().map(|t| t.cost_amount).sum(),
            cagr: cagr(&self.trades),
            avg_abs_position: mean(&positions.iter().map(|p| p.abs()).collect::<Vec<_>>()),
            position_std: sample_std(&positions),
            steps: self.trades.len(),
            nan_rows: self.nan_rows,
        }
    }

    /// Get all recorded steps
    pub fn get_trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Get equity curve
    pub fn get_equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }
}

/// Compound annual growth rate over the calendar span of the trade log
fn cagr(trades: &[TradeRecord]) -> f64 {
    let (first, last) = match (trades.first(), trades.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return f64::NAN,
    };
    let days = (last.date - first.date).num_days();
    if days <= 0 {
        return f64::NAN;
    }
    let years = days as f64 / 365.0;
    (1.0 + last.cumulative_return).powf(1.0 / years) - 1.0
}

/// Compounded net return per calendar month (`YYYY-MM`)
pub fn monthly_returns(trades: &[TradeRecord]) -> Vec<(String, f64)> {
    let mut months: BTreeMap<String, f64> = BTreeMap::new();
    for trade in trades {
        let growth = months
            .entry(trade.date.format("%Y-%m").to_string())
            .or_insert(1.0);
        *growth *= 1.0 + trade.daily_return;
    }
    months.into_iter().map(|(m, g)| (m, g - 1.0)).collect()
}
