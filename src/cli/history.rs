//! History command implementation

use super::open_store;
use crate::config::Config;
use crate::snapshot::SnapshotStore;
use chrono::{Duration, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Unified symbol (e.g., "BTC/USDT:USDT")
    #[arg(long)]
    pub symbol: String,

    /// Look back this many days
    #[arg(long, default_value = "7")]
    pub days: u32,
}

impl HistoryArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config).await?;
        let now = Utc::now();
        let from = now - Duration::days(i64::from(self.days));

        let history = store
            .results_for_symbol(&self.symbol, from, now + Duration::seconds(1))
            .await?;

        for entry in &history {
            let r = &entry.result;
            println!(
                "{}  {:<5} long {:>3}/{:<3} short {:>3}/{:<3} z {:>8.3}  raw {:.6}",
                entry.asof_ts,
                r.tier,
                r.rank_long,
                r.tier_population,
                r.rank_short,
                r.tier_population,
                r.standardized_score,
                r.raw_score
            );
        }
        println!("{} runs ranked {}", history.len(), self.symbol);

        Ok(())
    }
}
