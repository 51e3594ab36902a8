//! Error taxonomy for evaluation and backtesting
//!
//! Metric degeneracies never surface here: they are resolved locally with the
//! epsilon guard or a `NaN` for the affected metric.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Empty, mismatched-length or NaN-dominated input
    #[error("input validation failed: {0}")]
    InputValidation(String),

    /// Timestamps not strictly increasing
    #[error("data ordering violated at row {index}: {current} does not follow {previous}")]
    DataOrdering {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    /// Previous price of zero under the price-level return convention
    #[error("division by zero: previous price at row {index} is zero")]
    DivisionByZero { index: usize },

    /// Invalid configuration scalar
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EvalError {
    pub fn input(msg: impl Into<String>) -> Self {
        EvalError::InputValidation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EvalError::Config(msg.into())
    }
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;
