//! fusion-eval Library
//!
//! Evaluation and backtesting core for the fusion stock-prediction model

pub mod backtesting;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod persistence;
pub mod risk;
pub mod types;

pub use error::{EvalError, EvalResult};
