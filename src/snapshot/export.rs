//! Parquet export of evaluated snapshots for offline backtests

use super::{EvalRecord, ScanResult, ScanRun, SnapshotStore};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// One evaluated result with its snapshot ranks
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub asof_ts: DateTime<Utc>,
    pub run_id: String,
    pub symbol: String,
    pub tier: String,
    pub tier_population: usize,
    pub raw_score: f64,
    pub standardized_score: f64,
    pub rank_long: usize,
    pub rank_short: usize,
    /// `rank_long / tier_population`, 1/N for the strongest long
    pub long_percentile: f64,
    /// `rank_short / tier_population`
    pub short_percentile: f64,
    /// `LONG` when the long percentile is in the top half, else `SHORT`
    pub direction: &'static str,
    pub horizon_hours: u32,
    pub forward_return: f64,
}

/// Export schema
pub fn export_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "asof_ts",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("run_id", DataType::Utf8, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("tier", DataType::Utf8, false),
        Field::new("tier_population", DataType::Int64, false),
        Field::new("raw_score", DataType::Float64, false),
        Field::new("standardized_score", DataType::Float64, false),
        Field::new("rank_long", DataType::Int64, false),
        Field::new("rank_short", DataType::Int64, false),
        Field::new("long_percentile", DataType::Float64, false),
        Field::new("short_percentile", DataType::Float64, false),
        Field::new("direction", DataType::Utf8, false),
        Field::new("horizon_hours", DataType::Int64, false),
        Field::new("forward_return", DataType::Float64, false),
    ])
}

fn percentile(rank: usize, population: usize) -> f64 {
    rank as f64 / population.max(1) as f64
}

/// Join a run's evaluations to its results.
///
/// Percentiles use the tier population stored with each result. Evaluations
/// without a matching result are skipped.
pub fn join_run(run: &ScanRun, results: &[ScanResult], evals: &[EvalRecord]) -> Vec<ExportRow> {
    let by_symbol: HashMap<&str, &ScanResult> =
        results.iter().map(|r| (r.symbol.as_str(), r)).collect();

    evals
        .iter()
        .filter_map(|eval| {
            let result = by_symbol.get(eval.symbol.as_str())?;
            let long_percentile = percentile(result.rank_long, result.tier_population);
            Some(ExportRow {
                asof_ts: run.asof_ts,
                run_id: run.run_id.to_string(),
                symbol: result.symbol.clone(),
                tier: result.tier.to_string(),
                tier_population: result.tier_population,
                raw_score: result.raw_score,
                standardized_score: result.standardized_score,
                rank_long: result.rank_long,
                rank_short: result.rank_short,
                long_percentile,
                short_percentile: percentile(result.rank_short, result.tier_population),
                direction: if long_percentile <= 0.5 { "LONG" } else { "SHORT" },
                horizon_hours: eval.horizon_hours,
                forward_return: eval.forward_return,
            })
        })
        .collect()
}

/// Write rows to a Snappy-compressed Parquet file. Nothing is written for an empty slice.
pub fn write_export(path: &Path, rows: &[ExportRow]) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let schema = Arc::new(export_schema());
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let asof: Vec<i64> = rows.iter().map(|r| r.asof_ts.timestamp_micros()).collect();
    let ints = |f: fn(&ExportRow) -> i64| -> ArrayRef {
        Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let floats = |f: fn(&ExportRow) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let strings = |f: fn(&ExportRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMicrosecondArray::from(asof).with_timezone("UTC")) as ArrayRef,
            strings(|r| r.run_id.as_str()),
            strings(|r| r.symbol.as_str()),
            strings(|r| r.tier.as_str()),
            ints(|r| r.tier_population as i64),
            floats(|r| r.raw_score),
            floats(|r| r.standardized_score),
            ints(|r| r.rank_long as i64),
            ints(|r| r.rank_short as i64),
            floats(|r| r.long_percentile),
            floats(|r| r.short_percentile),
            strings(|r| r.direction),
            ints(|r| i64::from(r.horizon_hours)),
            floats(|r| r.forward_return),
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = rows.len(), "Wrote evaluation export to Parquet");

    Ok(())
}

/// Export every evaluated result of runs with `from <= asof_ts < to`; returns the row count
pub async fn export_evaluations(
    store: &dyn SnapshotStore,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    path: &Path,
) -> anyhow::Result<usize> {
    let mut by_run: HashMap<Uuid, Vec<EvalRecord>> = HashMap::new();
    for eval in store.evals_between(from, to).await? {
        by_run.entry(eval.run_id).or_default().push(eval);
    }

    let mut rows = Vec::new();
    for run in store.runs_between(from, to).await? {
        let Some(evals) = by_run.remove(&run.run_id) else {
            continue;
        };
        let results = store.results_for_run(run.run_id).await?;
        rows.extend(join_run(&run, &results, &evals));
    }

    write_export(path, &rows)?;
    tracing::info!(rows = rows.len(), path = %path.display(), "Export complete");

    Ok(rows.len())
}
