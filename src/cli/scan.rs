//! Scan command implementation

use super::{market_data, open_store, parse_timestamp};
use crate::config::Config;
use crate::inference::InferenceClient;
use crate::scan::{ScanSettings, Scanner};
use chrono::{DateTime, Utc};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Evaluate the clock at this instant instead of now (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<DateTime<Utc>>,
}

impl ScanArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config).await?;
        let scorer = InferenceClient::new(
            config.inference_url()?,
            Duration::from_secs(config.inference.timeout_secs),
        )?;
        let scanner = Scanner::new(
            market_data(config)?,
            Arc::new(scorer),
            store,
            ScanSettings::from_config(config),
        );

        let report = scanner.run(self.now.unwrap_or_else(Utc::now)).await?;

        println!(
            "run {} at {}: {} ranked ({} fetched, {} failed)",
            report.run.run_id,
            report.run.asof_ts,
            report.ranked.len(),
            report.fetch.fetched,
            report.fetch.failed
        );
        for tier in &report.candidates {
            println!("  {:<5} long:  {}", tier.tier, tier.long.join(", "));
            println!("  {:<5} short: {}", tier.tier, tier.short.join(", "));
        }

        Ok(())
    }
}
