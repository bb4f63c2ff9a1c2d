//! Reconcile command implementation

use super::open_store;
use crate::config::Config;
use crate::snapshot::SnapshotStore;
use chrono::{Duration, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Look back this many days
    #[arg(long, default_value = "7")]
    pub days: u32,
}

impl ReconcileArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config).await?;
        let now = Utc::now();
        let from = now - Duration::days(i64::from(self.days));

        let counts = store.result_counts(from, now + Duration::seconds(1)).await?;
        let broken: Vec<_> = counts.iter().filter(|c| !c.is_consistent()).collect();

        for c in &broken {
            tracing::warn!(
                run_id = %c.run_id,
                asof = %c.asof_ts,
                universe_size = c.universe_size,
                stored = c.result_count,
                "Run results incomplete"
            );
            println!(
                "{}  {}  expected {}  stored {}",
                c.run_id, c.asof_ts, c.universe_size, c.result_count
            );
        }
        println!("{} of {} runs inconsistent", broken.len(), counts.len());

        Ok(())
    }
}
