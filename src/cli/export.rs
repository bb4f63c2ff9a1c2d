//! Export command implementation

use super::{open_store, parse_timestamp};
use crate::config::Config;
use crate::snapshot::export_evaluations;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output Parquet file
    #[arg(short, long, default_value = "./output/evaluations.parquet")]
    pub output: PathBuf,

    /// First run time to include (RFC 3339); defaults to 30 days ago
    #[arg(long, value_parser = parse_timestamp)]
    pub start: Option<DateTime<Utc>>,

    /// Exclusive end of the run window (RFC 3339); defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub end: Option<DateTime<Utc>>,
}

impl ExportArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let end = self.end.unwrap_or_else(Utc::now);
        let start = self.start.unwrap_or(end - Duration::days(30));
        anyhow::ensure!(start < end, "--start must be before --end");

        let store = open_store(config).await?;
        let rows = export_evaluations(store.as_ref(), start, end, &self.output).await?;

        println!("exported {} rows to {}", rows, self.output.display());
        Ok(())
    }
}
