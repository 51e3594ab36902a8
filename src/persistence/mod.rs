//! Persistence layer
//!
//! Reads prediction tables from CSV and writes evaluation reports as CSV + JSON

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backtesting::BenchmarkPoint;
use crate::metrics::RollingMetrics;
use crate::evaluation::{
    Dimension, EvaluationSummary, GroupStatistics, PredictionSource, GROUP_METRICS,
};
use crate::types::{MetricsBundle, PricePoint, TradeRecord};

/// One row of a prediction table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Actual")]
    pub actual: Option<f64>,
    #[serde(rename = "Predicted")]
    pub predicted: Option<f64>,
}

impl PredictionRow {
    /// Missing cells become NaN
    pub fn to_point(&self) -> Result<PricePoint> {
        Ok(PricePoint::new(
            parse_date(&self.date)?,
            self.actual.unwrap_or(f64::NAN),
            self.predicted.unwrap_or(f64::NAN),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BenchmarkRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Adj Close")]
    close: f64,
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`
pub fn parse_date(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .with_context(|| format!("Unrecognised date: {}", s))
}

/// Load a `Date, Actual, Predicted` table; extra columns are ignored
pub fn read_predictions(path: &Path) -> Result<Vec<PricePoint>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open prediction file {}", path.display()))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut points = Vec::new();
    for result in reader.deserialize() {
        let row: PredictionRow = result.context("Failed to deserialize prediction row")?;
        points.push(row.to_point()?);
    }

    debug!(path = %path.display(), rows = points.len(), "Loaded predictions");
    Ok(points)
}

/// Load a benchmark price table (`Date`, `Adj Close`)
pub fn read_benchmark(path: &Path) -> Result<Vec<BenchmarkPoint>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open benchmark file {}", path.display()))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut points = Vec::new();
    for result in reader.deserialize() {
        let row: BenchmarkRow = result.context("Failed to deserialize benchmark row")?;
        points.push(BenchmarkPoint {
            date: parse_date(&row.date)?,
            close: row.close,
        });
    }
    Ok(points)
}

/// Prediction tables stored as `<data_dir>/<SYMBOL>.csv`
#[derive(Debug, Clone)]
pub struct CsvPredictionSource {
    data_dir: PathBuf,
}

impl CsvPredictionSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }
}

impl PredictionSource for CsvPredictionSource {
    fn fetch(&self, symbol: &str) -> Result<Option<Vec<PricePoint>>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(None);
        }
        read_predictions(&path).map(Some)
    }
}

#[derive(Debug, Serialize)]
struct MetricRow<'a> {
    metric: &'a str,
    group: String,
    value: f64,
}

#[derive(Debug, Serialize)]
struct MonthlyRow<'a> {
    month: &'a str,
    monthly_return: f64,
}

#[derive(Debug, Serialize)]
struct RollingRow {
    date: NaiveDateTime,
    sharpe: f64,
    volatility: f64,
    max_drawdown: f64,
}

#[derive(Debug, Serialize)]
struct RobustnessRow<'a> {
    scenario: &'a str,
    count: usize,
    #[serde(rename = "MAPE")]
    mape: f64,
    #[serde(rename = "Direction_Accuracy")]
    direction_accuracy: f64,
    #[serde(rename = "Sharpe_Ratio")]
    sharpe_ratio: f64,
}

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(WriterBuilder::new().has_headers(true).from_writer(file))
}

/// Trade log as CSV
pub fn write_trades(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut writer = create_writer(path)?;
    for trade in trades {
        writer
            .serialize(trade)
            .context("Failed to write trade record")?;
    }
    writer.flush().context("Failed to flush trade writer")?;
    Ok(())
}

/// Trade log rendered to a CSV string
pub fn trades_to_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for trade in trades {
        writer
            .serialize(trade)
            .context("Failed to write trade record")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish trade CSV: {}", e))?;
    String::from_utf8(bytes).context("Trade CSV is not UTF-8")
}

/// One `metric, group, value` row per entry
pub fn write_metrics(path: &Path, bundle: &MetricsBundle) -> Result<()> {
    let mut writer = create_writer(path)?;
    for (metric, value) in bundle.iter() {
        writer
            .serialize(MetricRow {
                metric,
                group: bundle
                    .group_of(metric)
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
                value,
            })
            .context("Failed to write metric row")?;
    }
    writer.flush().context("Failed to flush metrics writer")?;
    Ok(())
}

pub fn write_monthly_returns(path: &Path, months: &[(String, f64)]) -> Result<()> {
    let mut writer = create_writer(path)?;
    for (month, monthly_return) in months {
        writer
            .serialize(MonthlyRow {
                month,
                monthly_return: *monthly_return,
            })
            .context("Failed to write monthly return")?;
    }
    writer.flush().context("Failed to flush monthly writer")?;
    Ok(())
}

/// Rolling Sharpe, volatility and drawdown, one row per dated step
pub fn write_rolling_metrics(
    path: &Path,
    dates: &[NaiveDateTime],
    rolling: &RollingMetrics,
) -> Result<()> {
    let mut writer = create_writer(path)?;
    for (i, date) in dates.iter().enumerate() {
        let (sharpe, volatility, max_drawdown) = match (
            rolling.sharpe.get(i),
            rolling.volatility.get(i),
            rolling.max_drawdown.get(i),
        ) {
            (Some(s), Some(v), Some(d)) => (*s, *v, *d),
            _ => break,
        };
        writer
            .serialize(RollingRow {
                date: *date,
                sharpe,
                volatility,
                max_drawdown,
            })
            .context("Failed to write rolling metrics row")?;
    }
    writer.flush().context("Failed to flush rolling metrics writer")?;
    Ok(())
}

/// One row per symbol: tags followed by every metric seen in any report
pub fn write_detailed_results(path: &Path, summary: &EvaluationSummary) -> Result<()> {
    let mut names: Vec<&str> = summary
        .reports
        .iter()
        .flat_map(|r| r.metrics.iter().map(|(name, _)| name))
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec!["Symbol", "Market", "Market_Cap_Category", "Volatility_Category"];
    header.extend(names.iter().copied());
    writer.write_record(&header)?;

    for (i, report) in summary.reports.iter().enumerate() {
        let mut record = vec![
            report.symbol.clone(),
            report.market.clone(),
            report.cap_tier.clone(),
            summary
                .tier_of(i)
                .map(|t| t.to_string())
                .unwrap_or_default(),
        ];
        record.extend(names.iter().map(|name| {
            report
                .metrics
                .get(name)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer
            .write_record(&record)
            .context("Failed to write detailed result")?;
    }

    writer.flush().context("Failed to flush detailed results")?;
    Ok(())
}

/// `<Dimension>_statistics.csv`: group, count, then mean/std/min/max per metric
pub fn write_group_statistics(path: &Path, stats: &GroupStatistics) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec![stats.dimension.to_string(), "count".to_string()];
    header.extend(GROUP_METRICS.iter().flat_map(|metric| {
        ["mean", "std", "min", "max"]
            .into_iter()
            .map(move |agg| format!("{}_{}", metric, agg))
    }));
    writer.write_record(&header)?;

    for row in &stats.rows {
        let mut record = vec![row.group.clone(), row.count.to_string()];
        for (_, s) in &row.stats {
            record.extend([s.mean, s.std, s.min, s.max].iter().map(|v| v.to_string()));
        }
        writer
            .write_record(&record)
            .context("Failed to write group statistics")?;
    }

    writer.flush().context("Failed to flush group statistics")?;
    Ok(())
}

pub fn write_robustness(path: &Path, summary: &EvaluationSummary) -> Result<()> {
    let mut writer = create_writer(path)?;
    for r in &summary.robustness {
        writer
            .serialize(RobustnessRow {
                scenario: &r.scenario,
                count: r.count,
                mape: r.mape,
                direction_accuracy: r.direction_accuracy,
                sharpe_ratio: r.sharpe_ratio,
            })
            .context("Failed to write robustness row")?;
    }
    writer.flush().context("Failed to flush robustness writer")?;
    Ok(())
}

/// Writes a complete evaluation into one directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    save_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(save_dir: impl Into<PathBuf>) -> Result<Self> {
        let save_dir = save_dir.into();
        fs::create_dir_all(&save_dir).context("Failed to create report directory")?;
        Ok(Self { save_dir })
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Per-symbol folders, cross-symbol tables and `summary.json`
    pub fn write_all(&self, summary: &EvaluationSummary) -> Result<()> {
        for report in &summary.reports {
            let dir = self.save_dir.join(&report.symbol);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            write_trades(&dir.join("trades.csv"), &report.trades)?;
            write_metrics(&dir.join("metrics.csv"), &report.metrics)?;
            write_monthly_returns(&dir.join("monthly_returns.csv"), &report.monthly_returns)?;
            write_rolling_metrics(
                &dir.join("rolling_metrics.csv"),
                &report.rolling_dates,
                &report.rolling,
            )?;
        }

        write_detailed_results(&self.save_dir.join("detailed_results.csv"), summary)?;
        for dimension in Dimension::ALL {
            if let Some(stats) = summary.statistics(dimension) {
                let path = self.save_dir.join(format!("{}_statistics.csv", dimension));
                write_group_statistics(&path, stats)?;
            }
        }
        write_robustness(&self.save_dir.join("robustness_tests.csv"), summary)?;

        let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        fs::write(self.save_dir.join("summary.json"), json).context("Failed to write summary.json")?;

        info!(
            dir = %self.save_dir.display(),
            symbols = summary.reports.len(),
            skipped = summary.skipped.len(),
            "Reports written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{EvaluatorSettings, ModelEvaluator};
    use std::fs;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "fusion_eval_persistence_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn write_table(dir: &Path, symbol: &str, rows: usize) {
        let mut body = String::from("Date,Actual,Predicted,Extra\n");
        let mut price = 100.0;
        for i in 0..rows {
            price *= if i % 4 == 0 { 0.99 } else { 1.008 };
            body.push_str(&format!(
                "2023-01-{:02},{:.4},{:.4},x\n",
                i + 1,
                price,
                price * 1.001
            ));
        }
        fs::write(dir.join(format!("{}.csv", symbol)), body).unwrap();
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2022-03-04").is_ok());
        assert!(parse_date("2022-03-04 15:30:00").is_ok());
        assert!(parse_date("2022-03-04T15:30:00").is_ok());
        assert!(parse_date("04/03/2022").is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = temp_data_dir("missing");
        let source = CsvPredictionSource::new(&dir);
        assert!(source.fetch("NOPE").unwrap().is_none());
    }

    #[test]
    fn test_read_predictions_with_blank_cells() {
        let dir = temp_data_dir("blank");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("AAPL.csv"),
            "Date,Actual,Predicted\n2023-01-02,100.0,101.0\n2023-01-03,,102.0\n",
        )
        .unwrap();

        let points = CsvPredictionSource::new(&dir)
            .fetch("AAPL")
            .unwrap()
            .unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[1].actual.is_nan());
        assert_eq!(points[1].predicted, 102.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_read_benchmark() {
        let dir = temp_data_dir("bench");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("spx.csv");
        fs::write(&path, "Date,Open,Adj Close\n2023-01-02,1,3800.5\n2023-01-03,1,3820.0\n").unwrap();

        let points = read_benchmark(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].close, 3820.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_all_reports() {
        let data_dir = temp_data_dir("reports_in");
        let save_dir = temp_data_dir("reports_out");
        fs::create_dir_all(&data_dir).unwrap();
        write_table(&data_dir, "AAPL", 25);
        write_table(&data_dir, "JPM", 25);

        let evaluator = ModelEvaluator::new(EvaluatorSettings {
            rolling_window: 5,
            ..EvaluatorSettings::default()
        })
        .unwrap();
        let source = CsvPredictionSource::new(&data_dir);
        let symbols = vec!["AAPL".to_string(), "JPM".to_string(), "GE".to_string()];
        let summary = evaluator.evaluate(&source, &symbols);
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.skipped[0].symbol, "GE");

        let writer = ReportWriter::new(&save_dir).unwrap();
        writer.write_all(&summary).unwrap();

        for file in [
            "detailed_results.csv",
            "Market_statistics.csv",
            "Market_Cap_statistics.csv",
            "Volatility_statistics.csv",
            "robustness_tests.csv",
            "summary.json",
            "AAPL/trades.csv",
            "AAPL/metrics.csv",
            "JPM/monthly_returns.csv",
            "JPM/rolling_metrics.csv",
        ] {
            assert!(save_dir.join(file).exists(), "missing {}", file);
        }

        let detailed = fs::read_to_string(save_dir.join("detailed_results.csv")).unwrap();
        assert!(detailed.starts_with("Symbol,Market,Market_Cap_Category,Volatility_Category"));
        assert_eq!(detailed.lines().count(), 3);

        let trades = fs::read_to_string(save_dir.join("AAPL/trades.csv")).unwrap();
        assert_eq!(trades.lines().count(), 25);

        // header plus one row per return step; window of 5 fills on the fifth
        let rolling = fs::read_to_string(save_dir.join("AAPL/rolling_metrics.csv")).unwrap();
        let mut lines = rolling.lines();
        assert_eq!(lines.next(), Some("date,sharpe,volatility,max_drawdown"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 24);
        assert!(rows[0].ends_with(",NaN,NaN,NaN"));
        assert!(!rows[4].contains("NaN"));

        let _ = fs::remove_dir_all(&data_dir);
        let _ = fs::remove_dir_all(&save_dir);
    }
}
