//! Scan pipeline
//!
//! One pass: bar clock → universe fetch → features at the closed bar →
//! inference → cross-sectional ranking → snapshot write.

use crate::clock::{last_closed_bar, Timeframe};
use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::features::{FeatureEngine, FeatureRow, FeatureSpec};
use crate::feed::{fetch_universe, select_universe, BarSeries, FetchReport, MarketDataSource};
use crate::inference::{score_rows, Scorer};
use crate::ranker::{CrossSectionalRanker, RankInput, RankedRow, TierCandidates};
use crate::snapshot::{RunMetadata, ScanRun, SnapshotStore, SnapshotWriter};
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Parameters of one scan
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub timeframe: Timeframe,
    pub model_id: String,
    pub symbol_suffix: String,
    pub feature_spec: FeatureSpec,
    pub liquidity_window: usize,
    pub lookback_buffer: usize,
    pub ranker: CrossSectionalRanker,
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> Self {
        let scanner = &config.scanner;
        Self {
            timeframe: scanner.timeframe_hours,
            model_id: scanner.model_id.clone(),
            symbol_suffix: config.exchange.symbol_suffix.clone(),
            feature_spec: FeatureSpec::V1,
            liquidity_window: scanner.liquidity_window,
            lookback_buffer: scanner.lookback_buffer,
            ranker: CrossSectionalRanker::new(scanner.tier_thresholds(), scanner.top_k),
        }
    }

    /// Bars fetched per symbol: longest feature window plus the buffer, never
    /// fewer than the model's fixed history
    pub fn lookback_bars(&self) -> usize {
        self.feature_spec.min_history(self.liquidity_window) + self.lookback_buffer
    }
}

/// Outcome of a successful scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub run: ScanRun,
    pub fetch: FetchReport,
    /// Symbols with a bar exactly at the boundary
    pub rows_at_boundary: usize,
    /// Symbols that received a score
    pub rows_scored: usize,
    pub ranked: Vec<RankedRow>,
    pub candidates: Vec<TierCandidates>,
}

/// Orchestrates one scan over injected market data, scorer and store
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    scorer: Arc<dyn Scorer>,
    writer: SnapshotWriter,
    engine: FeatureEngine,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        scorer: Arc<dyn Scorer>,
        store: Arc<dyn SnapshotStore>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            scorer,
            writer: SnapshotWriter::new(store),
            engine: FeatureEngine::new(settings.feature_spec, settings.liquidity_window),
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run one scan for the last bar closed at `now`
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let started = Instant::now();
        let timeframe = self.settings.timeframe;
        let boundary = last_closed_bar(now, timeframe);

        tracing::info!(
            now = %now,
            boundary = %boundary,
            timeframe = %timeframe,
            model_id = %self.settings.model_id,
            "Starting scan"
        );

        let instruments = self
            .source
            .list_instruments()
            .await
            .map_err(ScanError::Listing)?;
        let symbols = select_universe(&instruments, &self.settings.symbol_suffix);
        tracing::info!(
            listed = instruments.len(),
            selected = symbols.len(),
            suffix = %self.settings.symbol_suffix,
            "Universe selected"
        );
        if symbols.is_empty() {
            return Err(ScanError::EmptyUniverse { attempted: 0 });
        }

        let fetched = fetch_universe(
            self.source.as_ref(),
            &symbols,
            timeframe,
            boundary,
            self.settings.lookback_bars(),
        )
        .await?;

        let rows = self.rows_at(&fetched.series, boundary);
        if rows.is_empty() {
            return Err(ScanError::MissingClosedBar(boundary));
        }

        let scores = score_rows(self.scorer.as_ref(), &self.settings.feature_spec, &rows).await?;
        let rows_scored = scores.iter().filter(|s| s.is_some()).count();
        if rows_scored == 0 {
            return Err(ScanError::NoScorableRows(boundary));
        }

        let inputs: Vec<RankInput> = rows
            .iter()
            .zip(&scores)
            .map(|(row, score)| RankInput {
                symbol: row.symbol.clone(),
                liquidity_proxy: row.liquidity_proxy(),
                raw_score: *score,
            })
            .collect();

        let ranked = self.settings.ranker.rank(&inputs);
        let candidates = self.settings.ranker.candidates(&ranked);
        log_candidates(&candidates);

        let meta = RunMetadata {
            asof_ts: boundary,
            timeframe,
            model_id: self.settings.model_id.clone(),
            feature_version: self.settings.feature_spec.version.to_string(),
            execution_time_ms: started.elapsed().as_millis() as i64,
        };
        let run = self.writer.write(&meta, &ranked).await?;

        record_latency(LatencyMetric::Scan, started.elapsed());
        set_gauge(GaugeMetric::UniverseSize, ranked.len() as f64);
        set_gauge(GaugeMetric::LastScanBoundary, boundary.timestamp() as f64);

        tracing::info!(
            run_id = %run.run_id,
            fetched = fetched.report.fetched,
            failed = fetched.report.failed,
            empty = fetched.report.empty,
            at_boundary = rows.len(),
            scored = rows_scored,
            ranked = ranked.len(),
            execution_time_ms = run.execution_time_ms,
            "Scan complete"
        );

        Ok(ScanReport {
            run,
            fetch: fetched.report,
            rows_at_boundary: rows.len(),
            rows_scored,
            ranked,
            candidates,
        })
    }

    /// Feature rows of every series that has a bar exactly at `boundary`
    fn rows_at(&self, series: &[BarSeries], boundary: DateTime<Utc>) -> Vec<FeatureRow> {
        series
            .iter()
            .filter_map(|s| {
                let row = self.engine.row_at(s, boundary);
                if row.is_none() {
                    tracing::warn!(symbol = %s.symbol, boundary = %boundary, "No bar at closed-bar boundary");
                }
                row
            })
            .collect()
    }
}

fn log_candidates(candidates: &[TierCandidates]) {
    for tier in candidates {
        tracing::info!(
            tier = %tier.tier,
            long = ?tier.long,
            short = ?tier.short,
            "Top candidates"
        );
    }
}
