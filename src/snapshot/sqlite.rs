//! SQLite snapshot store

use super::{EvalRecord, RunResultCount, ScanResult, ScanRun, SnapshotStore, SymbolResult};
use crate::error::{Result, ScanError};
use crate::ranker::Tier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// [`SnapshotStore`] on a sqlx SQLite pool, migrated on connect
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) and migrate the database at `url`.
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// since every new connection would see an empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::debug!(url, in_memory, "Snapshot store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct RunRow {
    run_id: String,
    asof_ts: i64,
    timeframe_hours: i64,
    model_id: String,
    feature_version: String,
    universe_size: i64,
    execution_time_ms: i64,
    created_at: i64,
}

#[derive(Debug, FromRow)]
struct ResultRow {
    run_id: String,
    symbol: String,
    tier: String,
    tier_population: i64,
    raw_score: f64,
    standardized_score: f64,
    rank_long: i64,
    rank_short: i64,
    liquidity_proxy: Option<f64>,
}

#[derive(Debug, FromRow)]
struct SymbolResultRow {
    asof_ts: i64,
    #[sqlx(flatten)]
    result: ResultRow,
}

#[derive(Debug, FromRow)]
struct EvalRow {
    run_id: String,
    symbol: String,
    horizon_hours: i64,
    forward_return: f64,
    rank_long_snapshot: i64,
    rank_short_snapshot: i64,
    price_at_signal: f64,
    price_at_horizon: f64,
    evaluated_at: i64,
}

#[derive(Debug, FromRow)]
struct CountRow {
    run_id: String,
    asof_ts: i64,
    universe_size: i64,
    result_count: i64,
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| ScanError::CorruptRow(format!("run_id '{}': {}", value, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ScanError::CorruptRow(format!("timestamp {} out of range", ms)))
}

fn to_count(value: i64, column: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| ScanError::CorruptRow(format!("{} is negative: {}", column, value)))
}

fn to_hours(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ScanError::CorruptRow(format!("{} out of range: {}", column, value)))
}

impl TryFrom<RunRow> for ScanRun {
    type Error = ScanError;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(ScanRun {
            run_id: parse_uuid(&row.run_id)?,
            asof_ts: from_millis(row.asof_ts)?,
            timeframe_hours: to_hours(row.timeframe_hours, "timeframe_hours")?,
            model_id: row.model_id,
            feature_version: row.feature_version,
            universe_size: to_count(row.universe_size, "universe_size")?,
            execution_time_ms: row.execution_time_ms,
            created_at: from_millis(row.created_at)?,
        })
    }
}

impl TryFrom<ResultRow> for ScanResult {
    type Error = ScanError;

    fn try_from(row: ResultRow) -> Result<Self> {
        Ok(ScanResult {
            run_id: parse_uuid(&row.run_id)?,
            tier: Tier::from_str(&row.tier).map_err(ScanError::CorruptRow)?,
            symbol: row.symbol,
            tier_population: to_count(row.tier_population, "tier_population")?,
            raw_score: row.raw_score,
            standardized_score: row.standardized_score,
            rank_long: to_count(row.rank_long, "rank_long")?,
            rank_short: to_count(row.rank_short, "rank_short")?,
            liquidity_proxy: row.liquidity_proxy,
        })
    }
}

impl TryFrom<SymbolResultRow> for SymbolResult {
    type Error = ScanError;

    fn try_from(row: SymbolResultRow) -> Result<Self> {
        Ok(SymbolResult {
            asof_ts: from_millis(row.asof_ts)?,
            result: row.result.try_into()?,
        })
    }
}

impl TryFrom<EvalRow> for EvalRecord {
    type Error = ScanError;

    fn try_from(row: EvalRow) -> Result<Self> {
        Ok(EvalRecord {
            run_id: parse_uuid(&row.run_id)?,
            symbol: row.symbol,
            horizon_hours: to_hours(row.horizon_hours, "horizon_hours")?,
            forward_return: row.forward_return,
            rank_long_snapshot: to_count(row.rank_long_snapshot, "rank_long_snapshot")?,
            rank_short_snapshot: to_count(row.rank_short_snapshot, "rank_short_snapshot")?,
            price_at_signal: row.price_at_signal,
            price_at_horizon: row.price_at_horizon,
            evaluated_at: from_millis(row.evaluated_at)?,
        })
    }
}

impl TryFrom<CountRow> for RunResultCount {
    type Error = ScanError;

    fn try_from(row: CountRow) -> Result<Self> {
        Ok(RunResultCount {
            run_id: parse_uuid(&row.run_id)?,
            asof_ts: from_millis(row.asof_ts)?,
            universe_size: to_count(row.universe_size, "universe_size")?,
            result_count: to_count(row.result_count, "result_count")?,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = ScanError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn insert_error(e: sqlx::Error, record: &EvalRecord) -> ScanError {
    let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if duplicate {
        ScanError::DuplicateEvaluation {
            run_id: record.run_id.to_string(),
            horizon_hours: i64::from(record.horizon_hours),
        }
    } else {
        ScanError::Store(e)
    }
}

const EVAL_COLUMNS: &str = "e.run_id AS run_id, e.symbol AS symbol, e.horizon_hours AS horizon_hours, \
     e.forward_return AS forward_return, e.rank_long_snapshot AS rank_long_snapshot, \
     e.rank_short_snapshot AS rank_short_snapshot, e.price_at_signal AS price_at_signal, \
     e.price_at_horizon AS price_at_horizon, e.evaluated_at AS evaluated_at";

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn insert_run(&self, run: &ScanRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_runs (
                run_id, asof_ts, timeframe_hours, model_id, feature_version,
                universe_size, execution_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(run.asof_ts.timestamp_millis())
        .bind(i64::from(run.timeframe_hours))
        .bind(&run.model_id)
        .bind(&run.feature_version)
        .bind(run.universe_size as i64)
        .bind(run.execution_time_ms)
        .bind(run.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_results(&self, results: &[ScanResult]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO scan_results (
                    run_id, symbol, tier, tier_population, raw_score,
                    standardized_score, rank_long, rank_short, liquidity_proxy
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(result.run_id.to_string())
            .bind(&result.symbol)
            .bind(result.tier.as_str())
            .bind(result.tier_population as i64)
            .bind(result.raw_score)
            .bind(result.standardized_score)
            .bind(result.rank_long as i64)
            .bind(result.rank_short as i64)
            .bind(result.liquidity_proxy)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_evals(&self, records: &[EvalRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO eval_records (
                    run_id, symbol, horizon_hours, forward_return,
                    rank_long_snapshot, rank_short_snapshot,
                    price_at_signal, price_at_horizon, evaluated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.run_id.to_string())
            .bind(&record.symbol)
            .bind(i64::from(record.horizon_hours))
            .bind(record.forward_return)
            .bind(record.rank_long_snapshot as i64)
            .bind(record.rank_short_snapshot as i64)
            .bind(record.price_at_signal)
            .bind(record.price_at_horizon)
            .bind(record.evaluated_at.timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(e, record))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn runs_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<ScanRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT run_id, asof_ts, timeframe_hours, model_id, feature_version,
                   universe_size, execution_time_ms, created_at
            FROM scan_runs
            WHERE asof_ts >= ? AND asof_ts < ?
            ORDER BY asof_ts, created_at
            "#,
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        convert(rows)
    }

    async fn results_for_run(&self, run_id: Uuid) -> Result<Vec<ScanResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(
            r#"
            SELECT run_id, symbol, tier, tier_population, raw_score,
                   standardized_score, rank_long, rank_short, liquidity_proxy
            FROM scan_results
            WHERE run_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        convert(rows)
    }

    async fn eval_exists(&self, run_id: Uuid, horizon_hours: u32) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM eval_records WHERE run_id = ? AND horizon_hours = ?",
        )
        .bind(run_id.to_string())
        .bind(i64::from(horizon_hours))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn evals_for_run(&self, run_id: Uuid) -> Result<Vec<EvalRecord>> {
        let sql = format!(
            "SELECT {} FROM eval_records e WHERE e.run_id = ? ORDER BY e.horizon_hours, e.rowid",
            EVAL_COLUMNS
        );
        let rows: Vec<EvalRow> = sqlx::query_as(&sql)
            .bind(run_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        convert(rows)
    }

    async fn evals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EvalRecord>> {
        let sql = format!(
            "SELECT {} FROM eval_records e \
             JOIN scan_runs r ON r.run_id = e.run_id \
             WHERE r.asof_ts >= ? AND r.asof_ts < ? \
             ORDER BY r.asof_ts, e.horizon_hours, e.rowid",
            EVAL_COLUMNS
        );
        let rows: Vec<EvalRow> = sqlx::query_as(&sql)
            .bind(from.timestamp_millis())
            .bind(to.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        convert(rows)
    }

    async fn results_for_symbol(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SymbolResult>> {
        let rows: Vec<SymbolResultRow> = sqlx::query_as(
            r#"
            SELECT r.asof_ts AS asof_ts, s.run_id AS run_id, s.symbol AS symbol,
                   s.tier AS tier, s.tier_population AS tier_population,
                   s.raw_score AS raw_score, s.standardized_score AS standardized_score,
                   s.rank_long AS rank_long, s.rank_short AS rank_short,
                   s.liquidity_proxy AS liquidity_proxy
            FROM scan_results s
            JOIN scan_runs r ON r.run_id = s.run_id
            WHERE s.symbol = ? AND r.asof_ts >= ? AND r.asof_ts < ?
            ORDER BY r.asof_ts, r.created_at
            "#,
        )
        .bind(symbol)
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        convert(rows)
    }

    async fn result_counts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RunResultCount>> {
        let rows: Vec<CountRow> = sqlx::query_as(
            r#"
            SELECT r.run_id AS run_id, r.asof_ts AS asof_ts, r.universe_size AS universe_size,
                   COUNT(s.symbol) AS result_count
            FROM scan_runs r
            LEFT JOIN scan_results s ON s.run_id = r.run_id
            WHERE r.asof_ts >= ? AND r.asof_ts < ?
            GROUP BY r.run_id, r.asof_ts, r.universe_size
            ORDER BY r.asof_ts
            "#,
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        convert(rows)
    }
}
