//! Evaluate command implementation

use super::{market_data, open_store, parse_timestamp};
use crate::config::Config;
use crate::evaluator::Evaluator;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Treat this instant as now (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<DateTime<Utc>>,
}

impl EvaluateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config).await?;
        let evaluator = Evaluator::new(market_data(config)?, store, config.evaluator.clone());

        let report = evaluator.evaluate(self.now.unwrap_or_else(Utc::now)).await?;

        println!(
            "evaluated {} of {} (pending {}, already done {}, empty {}, errored {}); {} records, {} discarded",
            report.processed,
            report.considered,
            report.pending,
            report.already_evaluated,
            report.empty,
            report.errored,
            report.records_written,
            report.returns_discarded
        );

        Ok(())
    }
}
