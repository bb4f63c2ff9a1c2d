//! Snapshot persistence
//!
//! Scan runs and their ranked results are written once and never updated.
//! Evaluation records are appended by the evaluator, at most one per
//! (run, symbol, horizon).

mod export;
mod sqlite;
mod writer;

pub use export::{export_evaluations, export_schema, join_run, write_export, ExportRow};
pub use sqlite::SqliteStore;
pub use writer::{RunMetadata, SnapshotWriter};

use crate::error::Result;
use crate::ranker::Tier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scan invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub run_id: Uuid,
    /// Open time of the closed bar the run scored
    pub asof_ts: DateTime<Utc>,
    pub timeframe_hours: u32,
    pub model_id: String,
    pub feature_version: String,
    /// Number of ranked symbols
    pub universe_size: usize,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// One ranked symbol within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub run_id: Uuid,
    pub symbol: String,
    pub tier: Tier,
    pub tier_population: usize,
    pub raw_score: f64,
    pub standardized_score: f64,
    pub rank_long: usize,
    pub rank_short: usize,
    pub liquidity_proxy: Option<f64>,
}

/// Realized forward return of one result at one horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub run_id: Uuid,
    pub symbol: String,
    pub horizon_hours: u32,
    pub forward_return: f64,
    pub rank_long_snapshot: usize,
    pub rank_short_snapshot: usize,
    pub price_at_signal: f64,
    pub price_at_horizon: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// A symbol's result in one run, with the run's bar time
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub asof_ts: DateTime<Utc>,
    pub result: ScanResult,
}

/// Stored result count of a run next to the size it declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResultCount {
    pub run_id: Uuid,
    pub asof_ts: DateTime<Utc>,
    pub universe_size: usize,
    pub result_count: usize,
}

impl RunResultCount {
    pub fn is_consistent(&self) -> bool {
        self.universe_size == self.result_count
    }
}

/// Typed repository over runs, results and evaluations
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn insert_run(&self, run: &ScanRun) -> Result<()>;

    async fn insert_results(&self, results: &[ScanResult]) -> Result<()>;

    /// Insert all records atomically; a duplicate (run, symbol, horizon) fails
    /// the whole batch with [`crate::error::ScanError::DuplicateEvaluation`]
    async fn insert_evals(&self, records: &[EvalRecord]) -> Result<()>;

    /// Runs with `from <= asof_ts < to`, oldest first
    async fn runs_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<ScanRun>>;

    async fn results_for_run(&self, run_id: Uuid) -> Result<Vec<ScanResult>>;

    /// Whether any evaluation exists for (run, horizon)
    async fn eval_exists(&self, run_id: Uuid, horizon_hours: u32) -> Result<bool>;

    async fn evals_for_run(&self, run_id: Uuid) -> Result<Vec<EvalRecord>>;

    /// Evaluations of runs with `from <= asof_ts < to`
    async fn evals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EvalRecord>>;

    /// Results for `symbol` across runs with `from <= asof_ts < to`, oldest first
    async fn results_for_symbol(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SymbolResult>>;

    /// Result counts for runs with `from <= asof_ts < to`, including runs with none
    async fn result_counts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RunResultCount>>;
}
