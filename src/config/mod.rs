//! Configuration management for fusion-eval
//!
//! Loads from YAML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::backtesting::BacktestConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub evaluation: EvaluationConfig,
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `config/` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from `<dir>/default.*`, `<dir>/local.*` and the environment
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let dir = dir.as_ref();
        let defaults = BacktestConfig::default();

        let config = Config::builder()
            // Evaluation defaults
            .set_default("evaluation.data_dir", "./data")?
            .set_default("evaluation.save_dir", "./evaluation_results")?
            .set_default("evaluation.risk_free_rate", 0.02)?
            .set_default("evaluation.confidence_level", 0.95)?
            .set_default("evaluation.rolling_window", 252)?
            .set_default("evaluation.concurrent", true)?
            // Backtest defaults
            .set_default("backtest.initial_capital", defaults.initial_capital)?
            .set_default("backtest.transaction_cost", defaults.transaction_cost)?
            .set_default("backtest.max_position", defaults.max_position)?
            .set_default("backtest.mode", defaults.mode.to_string())?
            .set_default("backtest.convention", defaults.convention.to_string())?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join("local").to_string_lossy()).required(false))
            // Override with environment variables (FUSION_EVAL__*)
            .add_source(Environment::with_prefix("FUSION_EVAL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.universe = app_config.universe.normalized();

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject scalars outside their valid ranges
    pub fn validate(&self) -> Result<()> {
        self.backtest
            .validate()
            .context("Invalid backtest configuration")?;
        self.universe
            .validate()
            .context("Invalid universe configuration")?;

        let q = self.evaluation.confidence_level;
        if !(q > 0.0 && q < 1.0) {
            bail!("evaluation.confidence_level must be in (0, 1), got {}", q);
        }
        if self.evaluation.rolling_window < 2 {
            bail!(
                "evaluation.rolling_window must be at least 2, got {}",
                self.evaluation.rolling_window
            );
        }
        if !self.evaluation.risk_free_rate.is_finite() {
            bail!("evaluation.risk_free_rate must be finite");
        }

        Ok(())
    }

    /// Symbols to evaluate, falling back to the whole universe
    pub fn symbols(&self) -> Vec<String> {
        if self.evaluation.symbols.is_empty() {
            self.universe.symbols()
        } else {
            self.evaluation
                .symbols
                .iter()
                .map(|s| s.to_uppercase())
                .collect()
        }
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "mode={} convention={} capital={:.0} cost={} max_pos={} rf={} q={} window={} symbols={}",
            self.backtest.mode,
            self.backtest.convention,
            self.backtest.initial_capital,
            self.backtest.transaction_cost,
            self.backtest.max_position,
            self.evaluation.risk_free_rate,
            self.evaluation.confidence_level,
            self.evaluation.rolling_window,
            self.symbols().len()
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
