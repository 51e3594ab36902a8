//! Position sizing and transaction cost models
//!
//! Implements:
//! - Sigmoid squashing of predicted returns into a bounded exposure
//! - Direction-only (long/flat) signals
//! - Fixed exposure
//! - Proportional and per-trade transaction costs
//!
//! A backtest is parameterised by one sizer and one cost model; the two
//! historical modes are just two such pairings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Map a predicted return to an exposure in `[-max_position, max_position]`
pub fn sigmoid_position(predicted_return: f64, max_position: f64) -> f64 {
    let position = 2.0 * max_position * (sigmoid(predicted_return) - 0.5);
    position.clamp(-max_position, max_position)
}

/// Turns predictions into target exposures
pub trait PositionSizer: Send + Sync {
    /// Target position for the step holding `prediction`.
    /// `previous_prediction` is `None` on the very first step.
    fn target_position(&self, previous_prediction: Option<f64>, prediction: f64) -> f64;

    /// Largest absolute exposure this sizer can emit
    fn max_position(&self) -> f64;
}

/// Continuous exposure proportional to the model's conviction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidSizer {
    pub max_position: f64,
}

impl SigmoidSizer {
    pub fn new(max_position: f64) -> Self {
        Self { max_position }
    }
}

impl PositionSizer for SigmoidSizer {
    fn target_position(&self, _previous_prediction: Option<f64>, prediction: f64) -> f64 {
        sigmoid_position(prediction, self.max_position)
    }

    fn max_position(&self) -> f64 {
        self.max_position
    }
}

/// Long when the prediction rises versus the previous one, flat otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalSizer {
    /// Exposure taken on an up signal
    pub long_position: f64,
}

impl DirectionalSizer {
    pub fn new(long_position: f64) -> Self {
        Self { long_position }
    }
}

impl Default for DirectionalSizer {
    fn default() -> Self {
        Self { long_position: 1.0 }
    }
}

impl PositionSizer for DirectionalSizer {
    fn target_position(&self, previous_prediction: Option<f64>, prediction: f64) -> f64 {
        match previous_prediction {
            Some(prev) if prediction > prev => self.long_position,
            _ => 0.0,
        }
    }

    fn max_position(&self) -> f64 {
        self.long_position
    }
}

/// Constant exposure regardless of the prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSizer {
    pub position: f64,
}

impl FixedSizer {
    pub fn new(position: f64) -> Self {
        Self {
            position: position.clamp(-1.0, 1.0),
        }
    }
}

impl PositionSizer for FixedSizer {
    fn target_position(&self, _previous_prediction: Option<f64>, _prediction: f64) -> f64 {
        self.position
    }

    fn max_position(&self) -> f64 {
        self.position.abs()
    }
}

/// Prices a change of position as a fraction of current capital
pub trait CostModel: Send + Sync {
    fn cost_fraction(&self, previous: f64, target: f64) -> f64;
}

/// Cost proportional to the size of the position change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalCost {
    pub rate: f64,
}

impl CostModel for ProportionalCost {
    fn cost_fraction(&self, previous: f64, target: f64) -> f64 {
        (target - previous).abs() * self.rate
    }
}

/// Flat fraction of capital on every position change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerTradeCost {
    pub rate: f64,
}

impl CostModel for PerTradeCost {
    fn cost_fraction(&self, previous: f64, target: f64) -> f64 {
        if target != previous {
            self.rate
        } else {
            0.0
        }
    }
}

/// When the step's transaction cost hits the portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTiming {
    /// Net return = position * return - cost
    FromReturn,
    /// Capital is charged first, the remainder then earns position * return
    FromCapital,
}

impl fmt::Display for CostTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostTiming::FromReturn => write!(f, "from_return"),
            CostTiming::FromCapital => write!(f, "from_capital"),
        }
    }
}
