//! Scan pipeline integration tests

use crate::common::*;
use alpha_scanner::config::Config;
use alpha_scanner::error::ScanError;
use alpha_scanner::ranker::Tier;
use alpha_scanner::scan::{ScanSettings, Scanner};
use alpha_scanner::snapshot::SnapshotStore;
use chrono::Duration;
use std::sync::Arc;

fn settings() -> ScanSettings {
    ScanSettings::from_config(&Config::default())
}

#[tokio::test]
async fn test_scan_ranks_and_persists_universe() {
    let market = Arc::new(SyntheticMarket::new(10, 60));
    let scorer = Arc::new(EmaScorer::default());
    let store = memory_store().await;
    let scanner = Scanner::new(market.clone(), scorer.clone(), store.clone(), settings());

    let report = scanner.run(scan_now()).await.unwrap();

    assert_eq!(report.run.asof_ts, boundary());
    assert_eq!(report.run.universe_size, 10);
    assert_eq!(report.run.timeframe_hours, 4);
    assert_eq!(report.run.feature_version, "v1");
    assert_eq!(report.fetch.attempted, 10);
    assert_eq!(report.rows_scored, 10);
    assert_eq!(scorer.calls(), 1);
    assert_eq!(scorer.rows_seen(), 10);

    // Inactive and foreign-settled listings are never fetched
    assert!(market
        .requests()
        .iter()
        .all(|(sym, _)| sym.ends_with(SUFFIX) && sym != "OLD/USDT:USDT"));

    let tier_of = |sym: String| {
        report
            .ranked
            .iter()
            .find(|r| r.symbol == sym)
            .map(|r| r.tier)
            .unwrap()
    };
    for i in 0..2 {
        assert_eq!(tier_of(symbol(i)), Tier::Large);
    }
    for i in 2..6 {
        assert_eq!(tier_of(symbol(i)), Tier::Mid);
    }
    for i in 6..10 {
        assert_eq!(tier_of(symbol(i)), Tier::Small);
    }

    let stored = store.results_for_run(report.run.run_id).await.unwrap();
    assert_eq!(stored.len(), 10);
    for result in &stored {
        let expected = match result.tier {
            Tier::Large => 2,
            Tier::Mid | Tier::Small => 4,
        };
        assert_eq!(result.tier_population, expected);
        assert!(result.rank_long >= 1 && result.rank_long <= expected);
        assert_eq!(result.rank_long + result.rank_short, expected + 1);
    }

    // Higher ema12 scores higher, so the pricier large-cap leads its tier
    let s01 = stored.iter().find(|r| r.symbol == symbol(1)).unwrap();
    assert_eq!(s01.rank_long, 1);
    let s00 = stored.iter().find(|r| r.symbol == symbol(0)).unwrap();
    assert_eq!(s00.rank_short, 1);

    let large = report
        .candidates
        .iter()
        .find(|c| c.tier == Tier::Large)
        .unwrap();
    assert_eq!(large.long, vec![symbol(1), symbol(0)]);
    assert_eq!(large.short, vec![symbol(0), symbol(1)]);

    let history = store
        .results_for_symbol(&symbol(1), boundary(), boundary() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].asof_ts, boundary());
    assert_eq!(history[0].result, *s01);
}

#[tokio::test]
async fn test_scan_drops_failed_symbol() {
    let market = Arc::new(SyntheticMarket::new(10, 60).failing(symbol(3)));
    let scorer = Arc::new(EmaScorer::default());
    let store = memory_store().await;
    let scanner = Scanner::new(market, scorer, store.clone(), settings());

    let report = scanner.run(scan_now()).await.unwrap();

    assert_eq!(report.fetch.failed, 1);
    assert_eq!(report.fetch.fetched, 9);
    assert_eq!(report.run.universe_size, 9);
    assert!(report.ranked.iter().all(|r| r.symbol != symbol(3)));

    let counts = store
        .result_counts(boundary(), boundary() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(counts.len(), 1);
    assert!(counts[0].is_consistent());
}

#[tokio::test]
async fn test_incomplete_history_writes_nothing() {
    let market = Arc::new(SyntheticMarket::new(1, 5));
    let scorer = Arc::new(EmaScorer::default());
    let store = memory_store().await;
    let scanner = Scanner::new(market, scorer.clone(), store.clone(), settings());

    let err = scanner.run(scan_now()).await.unwrap_err();

    assert!(matches!(err, ScanError::NoScorableRows(ts) if ts == boundary()));
    assert_eq!(scorer.calls(), 0);
    let runs = store
        .runs_between(boundary() - Duration::days(1), boundary() + Duration::days(1))
        .await
        .unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn test_all_symbols_failing_is_empty_universe() {
    let mut market = SyntheticMarket::new(2, 60);
    for i in 0..2 {
        market = market.failing(symbol(i));
    }
    let scanner = Scanner::new(
        Arc::new(market),
        Arc::new(EmaScorer::default()),
        memory_store().await,
        settings(),
    );

    let err = scanner.run(scan_now()).await.unwrap_err();
    assert!(matches!(err, ScanError::EmptyUniverse { attempted: 2 }));
}

#[tokio::test]
async fn test_scan_within_same_bar_targets_same_boundary() {
    let market = Arc::new(SyntheticMarket::new(4, 60));
    let store = memory_store().await;
    let scanner = Scanner::new(
        market,
        Arc::new(EmaScorer::default()),
        store.clone(),
        settings(),
    );

    let first = scanner.run(scan_now()).await.unwrap();
    let second = scanner
        .run(scan_now() + Duration::minutes(90))
        .await
        .unwrap();

    assert_eq!(first.run.asof_ts, second.run.asof_ts);
    assert_ne!(first.run.run_id, second.run.run_id);

    let a = store.results_for_run(first.run.run_id).await.unwrap();
    let b = store.results_for_run(second.run.run_id).await.unwrap();
    let scores = |rows: &[alpha_scanner::snapshot::ScanResult]| {
        let mut v: Vec<(String, f64)> = rows.iter().map(|r| (r.symbol.clone(), r.raw_score)).collect();
        v.sort_by(|x, y| x.0.cmp(&y.0));
        v
    };
    assert_eq!(scores(&a), scores(&b));
}

#[tokio::test]
async fn test_fetch_depth_does_not_change_model_inputs() {
    let market = Arc::new(SyntheticMarket::new(6, 120));

    let mut scores = Vec::new();
    for (buffer, liquidity_window) in [(10, 30), (60, 30), (10, 35)] {
        let mut config = Config::default();
        config.scanner.lookback_buffer = buffer;
        config.scanner.liquidity_window = liquidity_window;
        let scanner = Scanner::new(
            market.clone(),
            Arc::new(EmaScorer::default()),
            memory_store().await,
            ScanSettings::from_config(&config),
        );

        let report = scanner.run(scan_now()).await.unwrap();
        assert_eq!(report.run.feature_version, "v1");
        let mut raw: Vec<(String, u64)> = report
            .ranked
            .iter()
            .map(|r| (r.symbol.clone(), r.raw_score.to_bits()))
            .collect();
        raw.sort();
        scores.push(raw);
    }

    // Raw scores are the ema12 sent to the scorer
    assert_eq!(scores[0].len(), 6);
    assert_eq!(scores[0], scores[1]);
    assert_eq!(scores[0], scores[2]);
}
