//! Market data module
//!
//! Exchange listing, OHLCV retrieval, and the closed-bar-bounded fetch used by
//! both the scanner and the evaluator.

mod binance;
mod fetcher;
mod types;

pub use binance::{BinanceFuturesClient, ExchangeConfig, SUPPORTED_TIMEFRAME_HOURS};
pub(crate) use fetcher::bars_until;
pub use fetcher::{fetch_universe, lookback_since, select_universe, FetchReport, FetchedUniverse};
pub use types::{Bar, BarSeries, Instrument};

use crate::clock::Timeframe;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of exchange listings and OHLCV candles
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// All perpetual instruments the exchange lists
    async fn list_instruments(&self) -> anyhow::Result<Vec<Instrument>>;

    /// Up to `limit` bars for `symbol` with open time at or after `since`,
    /// ordered by open time
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<Bar>>;
}
