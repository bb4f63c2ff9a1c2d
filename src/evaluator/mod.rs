//! Forward-return evaluator
//!
//! Revisits stored runs once their horizon has fully elapsed and records the
//! realized return of every ranked symbol. Each (run, horizon) moves from
//! Pending to Eligible to Evaluated and is written at most once.

mod pricing;

pub use pricing::{forward_return, within_bound, PricePolicy};

use crate::clock::Timeframe;
use crate::config::EvaluatorConfig;
use crate::error::{Result, ScanError};
use crate::feed::MarketDataSource;
use crate::snapshot::{EvalRecord, ScanResult, ScanRun, SnapshotStore};
use crate::telemetry::{record_count, record_latency, CounterMetric, LatencyMetric};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Evaluation state of one (run, horizon)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Horizon plus safety margin has not elapsed yet
    Pending,
    /// Elapsed and not yet evaluated
    Eligible,
    /// Evaluation rows already exist
    Evaluated,
}

/// Counts for one evaluator invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    /// (run, horizon) pairs inspected
    pub considered: usize,
    /// Pairs that produced evaluation rows
    pub processed: usize,
    /// Pairs whose horizon has not elapsed
    pub pending: usize,
    /// Pairs evaluated earlier, here or by a concurrent evaluator
    pub already_evaluated: usize,
    /// Pairs where no symbol survived price and bound filtering
    pub empty: usize,
    /// Runs with no stored results
    pub errored: usize,
    pub records_written: usize,
    pub returns_discarded: usize,
}

enum Outcome {
    Written { records: usize, discarded: usize },
    Duplicate,
    Empty { discarded: usize },
    NoResults,
}

/// Computes and persists forward returns for stored runs
pub struct Evaluator {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn SnapshotStore>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn SnapshotStore>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    fn safety_margin(&self) -> Duration {
        Duration::hours(i64::from(self.config.safety_margin_hours))
    }

    /// Earliest instant at which (run, horizon) may be evaluated
    pub fn eligible_at(&self, run: &ScanRun, horizon_hours: u32) -> DateTime<Utc> {
        run.asof_ts + Duration::hours(i64::from(horizon_hours)) + self.safety_margin()
    }

    /// Classify (run, horizon) at `now` given whether rows already exist
    pub fn run_state(
        &self,
        run: &ScanRun,
        horizon_hours: u32,
        now: DateTime<Utc>,
        evaluated: bool,
    ) -> RunState {
        if evaluated {
            RunState::Evaluated
        } else if now < self.eligible_at(run, horizon_hours) {
            RunState::Pending
        } else {
            RunState::Eligible
        }
    }

    /// Evaluate every eligible (run, horizon) among runs newer than the look-back age.
    ///
    /// Store failures abort the invocation; per-symbol price failures only
    /// drop that symbol.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<EvalReport> {
        let started = Instant::now();
        let from = now - Duration::days(i64::from(self.config.lookback_days));
        let runs = self.store.runs_between(from, now).await?;
        let mut report = EvalReport::default();

        tracing::info!(
            runs = runs.len(),
            horizons = ?self.config.horizons_hours,
            since = %from,
            "Evaluating candidate runs"
        );

        for run in &runs {
            for &horizon in &self.config.horizons_hours {
                report.considered += 1;

                let evaluated = self.store.eval_exists(run.run_id, horizon).await?;
                match self.run_state(run, horizon, now, evaluated) {
                    RunState::Pending => {
                        tracing::debug!(run_id = %run.run_id, horizon, "Horizon not elapsed");
                        report.pending += 1;
                        continue;
                    }
                    RunState::Evaluated => {
                        tracing::debug!(run_id = %run.run_id, horizon, "Already evaluated");
                        report.already_evaluated += 1;
                        continue;
                    }
                    RunState::Eligible => {}
                }

                match self.evaluate_run(run, horizon, now).await? {
                    Outcome::Written { records, discarded } => {
                        report.processed += 1;
                        report.records_written += records;
                        report.returns_discarded += discarded;
                    }
                    Outcome::Duplicate => report.already_evaluated += 1,
                    Outcome::Empty { discarded } => {
                        report.empty += 1;
                        report.returns_discarded += discarded;
                    }
                    Outcome::NoResults => report.errored += 1,
                }
            }
        }

        record_latency(LatencyMetric::Evaluation, started.elapsed());
        tracing::info!(
            considered = report.considered,
            processed = report.processed,
            pending = report.pending,
            already_evaluated = report.already_evaluated,
            empty = report.empty,
            errored = report.errored,
            records = report.records_written,
            discarded = report.returns_discarded,
            "Evaluation summary"
        );

        Ok(report)
    }

    async fn evaluate_run(&self, run: &ScanRun, horizon: u32, now: DateTime<Utc>) -> Result<Outcome> {
        let results = self.store.results_for_run(run.run_id).await?;
        if results.is_empty() {
            tracing::warn!(run_id = %run.run_id, "Run has no stored results");
            return Ok(Outcome::NoResults);
        }

        let timeframe = Timeframe::from_hours(run.timeframe_hours).ok_or_else(|| {
            ScanError::CorruptRow(format!("run {} has zero timeframe", run.run_id))
        })?;
        let policy = PricePolicy {
            timeframe,
            jitter: Duration::seconds(self.config.jitter_tolerance_secs as i64),
        };
        let signal_at = run.asof_ts;
        let horizon_at = run.asof_ts + Duration::hours(i64::from(horizon));

        tracing::info!(
            run_id = %run.run_id,
            asof = %run.asof_ts,
            horizon,
            symbols = results.len(),
            "Evaluating run"
        );

        let mut records = Vec::with_capacity(results.len());
        let mut discarded = 0;

        for result in &results {
            let Some((p0, p1)) = self.prices(&policy, result, signal_at, horizon_at, now).await else {
                continue;
            };
            let Some(ret) = forward_return(p0, p1) else {
                tracing::warn!(symbol = %result.symbol, p0, p1, "Non-positive price, skipping");
                continue;
            };
            if !within_bound(ret, self.config.return_bound) {
                tracing::warn!(
                    symbol = %result.symbol,
                    forward_return = ret,
                    bound = self.config.return_bound,
                    "Forward return beyond sanity bound, discarding"
                );
                discarded += 1;
                continue;
            }

            records.push(EvalRecord {
                run_id: run.run_id,
                symbol: result.symbol.clone(),
                horizon_hours: horizon,
                forward_return: ret,
                rank_long_snapshot: result.rank_long,
                rank_short_snapshot: result.rank_short,
                price_at_signal: p0,
                price_at_horizon: p1,
                evaluated_at: now,
            });
        }

        record_count(CounterMetric::ReturnsDiscarded, discarded as u64);

        if records.is_empty() {
            tracing::warn!(run_id = %run.run_id, horizon, "No valid forward returns, nothing written");
            return Ok(Outcome::Empty { discarded });
        }

        match self.store.insert_evals(&records).await {
            Ok(()) => {
                record_count(CounterMetric::EvalRecordsWritten, records.len() as u64);
                tracing::info!(run_id = %run.run_id, horizon, records = records.len(), "Evaluation written");
                Ok(Outcome::Written {
                    records: records.len(),
                    discarded,
                })
            }
            Err(ScanError::DuplicateEvaluation { .. }) => {
                tracing::info!(run_id = %run.run_id, horizon, "Evaluated concurrently, skipping");
                Ok(Outcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Signal and horizon prices for one result; `None` drops the symbol
    async fn prices(
        &self,
        policy: &PricePolicy,
        result: &ScanResult,
        signal_at: DateTime<Utc>,
        horizon_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<(f64, f64)> {
        let p0 = self.lookup(policy, &result.symbol, signal_at, now).await?;
        let p1 = self.lookup(policy, &result.symbol, horizon_at, now).await?;
        Some((p0, p1))
    }

    async fn lookup(
        &self,
        policy: &PricePolicy,
        symbol: &str,
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        match policy.price_at(self.source.as_ref(), symbol, target, now).await {
            Ok(Some(price)) => Some(price),
            Ok(None) => {
                tracing::warn!(symbol = %symbol, target = %target, "No closed bar at target");
                None
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, target = %target, error = %e, "Price fetch failed");
                None
            }
        }
    }
}
