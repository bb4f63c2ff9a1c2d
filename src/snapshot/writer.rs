//! Sole writer of scan runs and results

use super::{ScanResult, ScanRun, SnapshotStore};
use crate::clock::Timeframe;
use crate::error::Result;
use crate::ranker::RankedRow;
use crate::telemetry::{record_count, CounterMetric};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Run-level fields known before the results are written
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub asof_ts: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub model_id: String,
    pub feature_version: String,
    pub execution_time_ms: i64,
}

/// Turns a ranked table into one run plus its results and inserts them
pub struct SnapshotWriter {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Build the records for a run without touching the store
    pub fn build(
        run_id: Uuid,
        created_at: DateTime<Utc>,
        meta: &RunMetadata,
        ranked: &[RankedRow],
    ) -> (ScanRun, Vec<ScanResult>) {
        let run = ScanRun {
            run_id,
            asof_ts: meta.asof_ts,
            timeframe_hours: meta.timeframe.hours(),
            model_id: meta.model_id.clone(),
            feature_version: meta.feature_version.clone(),
            universe_size: ranked.len(),
            execution_time_ms: meta.execution_time_ms,
            created_at,
        };

        let results = ranked
            .iter()
            .map(|row| ScanResult {
                run_id,
                symbol: row.symbol.clone(),
                tier: row.tier,
                tier_population: row.tier_population,
                raw_score: row.raw_score,
                standardized_score: row.standardized_score,
                rank_long: row.rank_long,
                rank_short: row.rank_short,
                liquidity_proxy: row.liquidity_proxy,
            })
            .collect();

        (run, results)
    }

    /// Insert a new run and its results under a fresh run id
    pub async fn write(&self, meta: &RunMetadata, ranked: &[RankedRow]) -> Result<ScanRun> {
        let (run, results) = Self::build(Uuid::new_v4(), Utc::now(), meta, ranked);

        self.store.insert_run(&run).await?;
        self.store.insert_results(&results).await?;
        record_count(CounterMetric::ResultsWritten, results.len() as u64);

        tracing::info!(
            run_id = %run.run_id,
            asof = %run.asof_ts,
            universe_size = run.universe_size,
            "Snapshot written"
        );

        Ok(run)
    }
}
