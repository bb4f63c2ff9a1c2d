//! Scan → evaluate → export integration tests

use crate::common::*;
use alpha_scanner::config::{Config, EvaluatorConfig};
use alpha_scanner::evaluator::Evaluator;
use alpha_scanner::scan::{ScanSettings, Scanner};
use alpha_scanner::snapshot::{export_evaluations, ScanRun, SnapshotStore, SqliteStore};
use chrono::{DateTime, Duration, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::sync::Arc;

async fn scanned(market: Arc<SyntheticMarket>) -> (Arc<SqliteStore>, ScanRun) {
    let store = memory_store().await;
    let scanner = Scanner::new(
        market,
        Arc::new(EmaScorer::default()),
        store.clone(),
        ScanSettings::from_config(&Config::default()),
    );
    let report = scanner.run(scan_now()).await.unwrap();
    (store, report.run)
}

/// Signal bar plus four hours of horizon plus the four hour margin
fn eligible_now() -> DateTime<Utc> {
    boundary() + Duration::hours(8)
}

#[tokio::test]
async fn test_evaluate_after_scan() {
    let market = Arc::new(SyntheticMarket::new(10, 60));
    let (store, run) = scanned(market.clone()).await;
    let evaluator = Evaluator::new(market.clone(), store.clone(), EvaluatorConfig::default());

    let report = evaluator.evaluate(eligible_now()).await.unwrap();
    assert_eq!(report.considered, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.records_written, 10);
    assert_eq!(report.returns_discarded, 0);

    let records = store.evals_for_run(run.run_id).await.unwrap();
    let results = store.results_for_run(run.run_id).await.unwrap();
    assert_eq!(records.len(), 10);

    let horizon_at = boundary() + Duration::hours(4);
    for record in &records {
        let p0 = market.close_at(&record.symbol, boundary());
        let p1 = market.close_at(&record.symbol, horizon_at);
        assert_eq!(record.horizon_hours, 4);
        assert_eq!(record.price_at_signal, p0);
        assert_eq!(record.price_at_horizon, p1);
        assert!((record.forward_return - (p1 / p0 - 1.0)).abs() < 1e-12);

        let result = results.iter().find(|r| r.symbol == record.symbol).unwrap();
        assert_eq!(record.rank_long_snapshot, result.rank_long);
        assert_eq!(record.rank_short_snapshot, result.rank_short);
    }
}

#[tokio::test]
async fn test_evaluation_waits_for_safety_margin() {
    let market = Arc::new(SyntheticMarket::new(3, 60));
    let (store, run) = scanned(market.clone()).await;
    let evaluator = Evaluator::new(market, store.clone(), EvaluatorConfig::default());

    let report = evaluator
        .evaluate(eligible_now() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(report.records_written, 0);
    assert!(!store.eval_exists(run.run_id, 4).await.unwrap());
}

#[tokio::test]
async fn test_repeat_evaluation_is_noop() {
    let market = Arc::new(SyntheticMarket::new(5, 60));
    let (store, run) = scanned(market.clone()).await;
    let evaluator = Evaluator::new(market, store.clone(), EvaluatorConfig::default());

    let first = evaluator.evaluate(eligible_now()).await.unwrap();
    let second = evaluator
        .evaluate(eligible_now() + Duration::hours(4))
        .await
        .unwrap();

    assert_eq!(first.records_written, 5);
    assert_eq!(second.records_written, 0);
    assert_eq!(second.already_evaluated, 1);
    assert_eq!(store.evals_for_run(run.run_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_multiple_horizons() {
    let market = Arc::new(SyntheticMarket::new(4, 60));
    let (store, run) = scanned(market.clone()).await;
    let config = EvaluatorConfig {
        horizons_hours: vec![4, 24],
        ..EvaluatorConfig::default()
    };
    let evaluator = Evaluator::new(market, store.clone(), config);

    // Only the short horizon has elapsed
    let report = evaluator.evaluate(eligible_now()).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.pending, 1);

    let later = boundary() + Duration::hours(28);
    let report = evaluator.evaluate(later).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.already_evaluated, 1);

    assert!(store.eval_exists(run.run_id, 24).await.unwrap());
    assert_eq!(store.evals_for_run(run.run_id).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_export_joins_evaluations() {
    let market = Arc::new(SyntheticMarket::new(10, 60));
    let (store, _run) = scanned(market.clone()).await;
    let evaluator = Evaluator::new(market, store.clone(), EvaluatorConfig::default());
    evaluator.evaluate(eligible_now()).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("evaluations.parquet");
    let written = export_evaluations(
        store.as_ref(),
        boundary() - Duration::days(1),
        boundary() + Duration::days(1),
        &path,
    )
    .await
    .unwrap();
    assert_eq!(written, 10);

    let file = std::fs::File::open(&path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(rows, 10);
}
