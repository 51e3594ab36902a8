//! Configuration section types

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Directory holding one `<SYMBOL>.csv` prediction table per symbol
    pub data_dir: String,
    /// Output directory for reports
    pub save_dir: String,
    /// Symbols to evaluate; empty means every symbol of the universe
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Annual risk-free rate used by the Sharpe ratio
    pub risk_free_rate: f64,
    /// VaR / CVaR confidence level
    pub confidence_level: f64,
    /// Rolling metrics window in periods
    pub rolling_window: usize,
    /// Evaluate symbols on the blocking pool
    pub concurrent: bool,
    /// Optional `Date, Adj Close` table compared against every symbol
    #[serde(default)]
    pub benchmark_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Ticker classification tables
#[derive(Debug, Clone, Deserialize)]
pub struct UniverseConfig {
    /// Symbol -> market / sector label
    #[serde(default = "default_market_types")]
    pub market_types: BTreeMap<String, String>,
    #[serde(default = "default_large_cap")]
    pub large_cap: Vec<String>,
    #[serde(default = "default_mid_cap")]
    pub mid_cap: Vec<String>,
    /// Market label for symbols missing from `market_types`
    #[serde(default = "default_market")]
    pub default_market: String,
    /// Cap tier for symbols in neither cap list
    #[serde(default = "default_cap_tier")]
    pub default_cap_tier: String,
}

pub const LARGE_CAP: &str = "Large Cap";
pub const MID_CAP: &str = "Mid Cap";

fn default_market_types() -> BTreeMap<String, String> {
    [
        ("AAPL", "Tech"),
        ("MSFT", "Tech"),
        ("GOOGL", "Tech"),
        ("AMZN", "Tech"),
        ("META", "Tech"),
        ("JPM", "Financial"),
        ("BAC", "Financial"),
        ("GS", "Financial"),
        ("GE", "Industrial"),
        ("BA", "Industrial"),
        ("CAT", "Industrial"),
        ("JNJ", "Healthcare"),
        ("PFE", "Healthcare"),
        ("UNH", "Healthcare"),
    ]
    .into_iter()
    .map(|(s, m)| (s.to_string(), m.to_string()))
    .collect()
}

fn default_large_cap() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_mid_cap() -> Vec<String> {
    ["GE", "BA", "CAT", "UNH", "PFE"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_market() -> String {
    "Unknown".to_string()
}

fn default_cap_tier() -> String {
    "Small Cap".to_string()
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            market_types: default_market_types(),
            large_cap: default_large_cap(),
            mid_cap: default_mid_cap(),
            default_market: default_market(),
            default_cap_tier: default_cap_tier(),
        }
    }
}

impl UniverseConfig {
    /// Upper-case every ticker so lookups are case-insensitive
    pub fn normalized(self) -> Self {
        Self {
            market_types: self
                .market_types
                .into_iter()
                .map(|(s, m)| (s.to_uppercase(), m))
                .collect(),
            large_cap: self.large_cap.iter().map(|s| s.to_uppercase()).collect(),
            mid_cap: self.mid_cap.iter().map(|s| s.to_uppercase()).collect(),
            ..self
        }
    }

    pub fn market_for(&self, symbol: &str) -> &str {
        self.market_types
            .get(&symbol.to_uppercase())
            .map(String::as_str)
            .unwrap_or(&self.default_market)
    }

    pub fn cap_tier(&self, symbol: &str) -> &str {
        let symbol = symbol.to_uppercase();
        if self.large_cap.contains(&symbol) {
            LARGE_CAP
        } else if self.mid_cap.contains(&symbol) {
            MID_CAP
        } else {
            &self.default_cap_tier
        }
    }

    /// Every symbol with a market label, in ticker order
    pub fn symbols(&self) -> Vec<String> {
        self.market_types.keys().cloned().collect()
    }

    pub fn validate(&self) -> EvalResult<()> {
        if self.default_market.trim().is_empty() {
            return Err(EvalError::config("universe.default_market is empty"));
        }
        if self.default_cap_tier.trim().is_empty() {
            return Err(EvalError::config("universe.default_cap_tier is empty"));
        }
        if let Some(dup) = self
            .large_cap
            .iter()
            .find(|s| self.mid_cap.iter().any(|m| m.eq_ignore_ascii_case(s)))
        {
            return Err(EvalError::config(format!(
                "{} is listed as both large and mid cap",
                dup
            )));
        }
        Ok(())
    }
}
