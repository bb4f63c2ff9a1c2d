//! CLI interface for alpha-scanner
//!
//! Provides subcommands for:
//! - `scan`: Score and rank the universe at the last closed bar
//! - `evaluate`: Record forward returns for elapsed runs
//! - `reconcile`: List runs whose stored results are incomplete
//! - `history`: Show one symbol's stored ranks over time
//! - `export`: Write evaluated snapshots to Parquet
//! - `config`: Show the effective configuration

mod evaluate;
mod export;
mod history;
mod reconcile;
mod scan;

pub use evaluate::EvaluateArgs;
pub use export::ExportArgs;
pub use history::HistoryArgs;
pub use reconcile::ReconcileArgs;
pub use scan::ScanArgs;

use crate::config::Config;
use crate::feed::{BinanceFuturesClient, MarketDataSource};
use crate::snapshot::SqliteStore;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "alpha-scanner")]
#[command(about = "Cross-sectional alpha scanner for crypto perpetual futures")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score and rank the universe at the last closed bar
    Scan(ScanArgs),
    /// Record forward returns for runs whose horizon has elapsed
    Evaluate(EvaluateArgs),
    /// List runs whose stored result count differs from their universe size
    Reconcile(ReconcileArgs),
    /// Show one symbol's stored tier and ranks across recent runs
    History(HistoryArgs),
    /// Export evaluated snapshots to Parquet
    Export(ExportArgs),
    /// Show the effective configuration
    Config,
}

/// Parse an RFC 3339 timestamp argument
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", value, e))
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    let url = config.database_url()?;
    let store = SqliteStore::connect(url, config.store.max_connections).await?;
    Ok(Arc::new(store))
}

fn market_data(config: &Config) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    Ok(Arc::new(BinanceFuturesClient::new(config.exchange.clone())?))
}
