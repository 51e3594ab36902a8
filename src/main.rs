//! fusion-eval: batch evaluation of fusion-model predictions
//!
//! Reads `<data_dir>/<SYMBOL>.csv` prediction tables, evaluates every
//! configured symbol and writes the reports to `save_dir`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fusion_eval::config::{AppConfig, LoggingConfig};
use fusion_eval::evaluation::{EvaluatorSettings, ModelEvaluator, PredictionSource};
use fusion_eval::persistence::{read_benchmark, CsvPredictionSource, ReportWriter};

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    info!(config = %config, "Starting fusion-eval");

    let symbols = config.symbols();
    let mut settings = EvaluatorSettings::from(&config);
    if let Some(path) = &config.evaluation.benchmark_path {
        settings.benchmark = read_benchmark(Path::new(path))
            .with_context(|| format!("Failed to load benchmark {}", path))?;
        info!(path = %path, rows = settings.benchmark.len(), "Benchmark loaded");
    }
    let evaluator = ModelEvaluator::new(settings).context("Invalid evaluator settings")?;
    let source = CsvPredictionSource::new(&config.evaluation.data_dir);

    let summary = if config.evaluation.concurrent {
        let source: Arc<dyn PredictionSource> = Arc::new(source);
        evaluator.evaluate_concurrent(source, &symbols).await
    } else {
        evaluator.evaluate(&source, &symbols)
    };

    for skipped in &summary.skipped {
        warn!(symbol = %skipped.symbol, reason = %skipped.reason, "Symbol not evaluated");
    }
    if summary.reports.is_empty() {
        warn!("No symbols evaluated, nothing to report");
        return Ok(());
    }

    let save_dir = PathBuf::from(&config.evaluation.save_dir)
        .join(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
    let writer = ReportWriter::new(&save_dir)?;
    writer.write_all(&summary)?;

    info!(
        evaluated = summary.reports.len(),
        skipped = summary.skipped.len(),
        dir = %writer.save_dir().display(),
        "Evaluation completed"
    );

    Ok(())
}
