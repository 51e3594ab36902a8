//! Batch evaluation integration tests

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use fusion_eval::backtesting::{BacktestConfig, BacktestMode};
    use fusion_eval::config::UniverseConfig;
    use fusion_eval::evaluation::{
        Dimension, EvaluatorSettings, ModelEvaluator, PredictionSource, VolatilityTier,
    };
    use fusion_eval::persistence::{CsvPredictionSource, ReportWriter};
    use fusion_eval::types::{PricePoint, ReturnConvention};
    use mockall::mock;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    mock! {
        pub Source {}
        impl PredictionSource for Source {
            fn fetch(&self, symbol: &str) -> anyhow::Result<Option<Vec<PricePoint>>>;
        }
    }

    /// Price path with a given daily drift and swing size
    fn path(n: usize, drift: f64, swing: f64) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                let shock = if i % 2 == 0 { swing } else { -swing * 0.8 };
                price *= 1.0 + drift + shock;
                let predicted = price * (1.0 + shock * 0.1);
                PricePoint::new(start + Duration::days(i as i64), price, predicted)
            })
            .collect()
    }

    fn settings() -> EvaluatorSettings {
        EvaluatorSettings {
            rolling_window: 20,
            ..EvaluatorSettings::default()
        }
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fusion_eval_it_{}_{}", name, uuid::Uuid::new_v4()))
    }

    // ============================================================================
    // Evaluator
    // ============================================================================

    #[test]
    fn test_missing_symbol_does_not_abort_batch() {
        let mut source = MockSource::new();
        source.expect_fetch().returning(|symbol| {
            if symbol == "GS" {
                Ok(None)
            } else {
                Ok(Some(path(60, 0.001, 0.01)))
            }
        });

        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let summary = evaluator.evaluate(&source, &symbols(&["AAPL", "GS", "BA"]));

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].symbol, "GS");
        assert_eq!(summary.reports[1].cap_tier, "Mid Cap");
    }

    #[test]
    fn test_bad_table_is_skipped_with_reason() {
        let mut source = MockSource::new();
        source.expect_fetch().returning(|symbol| {
            let mut points = path(30, 0.0, 0.01);
            if symbol == "JNJ" {
                points.swap(3, 4);
            }
            Ok(Some(points))
        });

        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let summary = evaluator.evaluate(&source, &symbols(&["JNJ", "UNH"]));

        assert_eq!(summary.reports.len(), 1);
        assert!(summary.skipped[0].reason.contains("data ordering"));
    }

    #[test]
    fn test_unknown_symbol_uses_default_market() {
        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let report = evaluator
            .evaluate_symbol("XYZ", &path(40, 0.0005, 0.01))
            .unwrap();
        assert_eq!(report.market, "Unknown");
        assert_eq!(report.cap_tier, "Small Cap");
    }

    #[test]
    fn test_custom_universe() {
        let mut universe = UniverseConfig::default();
        universe.default_market = "Other".to_string();
        universe
            .market_types
            .insert("TSLA".to_string(), "Auto".to_string());

        let evaluator = ModelEvaluator::new(EvaluatorSettings {
            universe,
            ..settings()
        })
        .unwrap();
        let points = path(40, 0.0005, 0.01);
        assert_eq!(evaluator.evaluate_symbol("tsla", &points).unwrap().market, "Auto");
        assert_eq!(evaluator.evaluate_symbol("XYZ", &points).unwrap().market, "Other");
    }

    #[test]
    fn test_volatility_tiers_split_symbols() {
        let mut source = MockSource::new();
        source.expect_fetch().returning(|symbol| {
            let swing = match symbol {
                "AAPL" | "MSFT" => 0.002,
                "JPM" | "BAC" => 0.01,
                _ => 0.04,
            };
            Ok(Some(path(80, 0.0, swing)))
        });

        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let summary = evaluator.evaluate(
            &source,
            &symbols(&["AAPL", "MSFT", "JPM", "BAC", "GE", "CAT"]),
        );

        assert_eq!(summary.tier_of(0), Some(VolatilityTier::Low));
        assert_eq!(summary.tier_of(2), Some(VolatilityTier::Medium));
        assert_eq!(summary.tier_of(5), Some(VolatilityTier::High));

        let by_vol = summary.statistics(Dimension::Volatility).unwrap();
        assert_eq!(by_vol.rows.len(), 3);
        assert!(by_vol.rows.iter().all(|row| row.count == 2));

        let by_market = summary.statistics(Dimension::Market).unwrap();
        let groups: Vec<&str> = by_market.rows.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, vec!["Financial", "Industrial", "Tech"]);
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let mut seq_source = MockSource::new();
        seq_source
            .expect_fetch()
            .returning(|_| Ok(Some(path(50, 0.001, 0.015))));
        let mut par_source = MockSource::new();
        par_source
            .expect_fetch()
            .returning(|_| Ok(Some(path(50, 0.001, 0.015))));

        let evaluator = ModelEvaluator::new(EvaluatorSettings {
            backtest: BacktestConfig {
                mode: BacktestMode::Continuous,
                convention: ReturnConvention::PriceLevels,
                ..BacktestConfig::continuous()
            },
            ..settings()
        })
        .unwrap();
        let names = symbols(&["AAPL", "JPM", "GE", "PFE"]);

        let sequential = evaluator.evaluate(&seq_source, &names);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let source: Arc<dyn PredictionSource> = Arc::new(par_source);
        let concurrent = rt.block_on(evaluator.evaluate_concurrent(source, &names));

        assert_eq!(sequential.reports.len(), concurrent.reports.len());
        for (a, b) in sequential.reports.iter().zip(&concurrent.reports) {
            assert_eq!(a.symbol, b.symbol);
            assert_eq!(a.backtest.final_portfolio, b.backtest.final_portfolio);
        }
    }

    struct FlakySource;

    impl PredictionSource for FlakySource {
        fn fetch(&self, symbol: &str) -> anyhow::Result<Option<Vec<PricePoint>>> {
            if symbol == "BAC" {
                panic!("reader crashed on {}", symbol);
            }
            Ok(Some(path(50, 0.001, 0.015)))
        }
    }

    #[test]
    fn test_panicked_task_becomes_skipped_symbol() {
        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let source: Arc<dyn PredictionSource> = Arc::new(FlakySource);
        let summary =
            rt.block_on(evaluator.evaluate_concurrent(source, &symbols(&["AAPL", "BAC", "GE"])));

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[1].symbol, "GE");
        assert_eq!(summary.skipped[0].symbol, "BAC");
        assert!(summary.skipped[0].reason.contains("evaluation task failed"));
    }

    // ============================================================================
    // End to end
    // ============================================================================

    #[test]
    fn test_csv_directory_to_reports() {
        let data_dir = temp_dir("data");
        let save_dir = temp_dir("out");
        fs::create_dir_all(&data_dir).unwrap();

        for (symbol, swing) in [("AAPL", 0.005), ("JPM", 0.02)] {
            let mut body = String::from("Date,Actual,Predicted\n");
            for p in path(40, 0.001, swing) {
                body.push_str(&format!(
                    "{},{},{}\n",
                    p.date.format("%Y-%m-%d"),
                    p.actual,
                    p.predicted
                ));
            }
            fs::write(data_dir.join(format!("{}.csv", symbol)), body).unwrap();
        }

        let evaluator = ModelEvaluator::new(settings()).unwrap();
        let source = CsvPredictionSource::new(&data_dir);
        let summary = evaluator.evaluate(&source, &symbols(&["AAPL", "JPM", "META"]));
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.skipped[0].reason, "no predictions");

        ReportWriter::new(&save_dir)
            .unwrap()
            .write_all(&summary)
            .unwrap();

        let json = fs::read_to_string(save_dir.join("summary.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reports"].as_array().unwrap().len(), 2);
        assert_eq!(value["skipped"][0]["symbol"], "META");

        let robustness = fs::read_to_string(save_dir.join("robustness_tests.csv")).unwrap();
        assert!(robustness.starts_with("scenario,count,MAPE,Direction_Accuracy,Sharpe_Ratio"));

        let _ = fs::remove_dir_all(&data_dir);
        let _ = fs::remove_dir_all(&save_dir);
    }
}
