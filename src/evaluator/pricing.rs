//! Closed-bar price lookup and forward-return arithmetic

use crate::clock::Timeframe;
use crate::feed::{bars_until, lookback_since, Bar, MarketDataSource};
use chrono::{DateTime, Duration, Utc};

/// Bars requested before the target, so a late or missing candle still leaves
/// a candidate for the jitter check
const PRICE_LOOKBACK_BARS: usize = 2;

/// Bar-matching policy shared by every price lookup
#[derive(Debug, Clone, Copy)]
pub struct PricePolicy {
    pub timeframe: Timeframe,
    /// Maximum `target - open_time` accepted for the matched bar
    pub jitter: Duration,
}

impl PricePolicy {
    /// Close of the latest bar that opened at or before `target`, within the
    /// jitter tolerance, and had closed by `now`
    pub fn select_close(&self, bars: &[Bar], target: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
        bars.iter()
            .filter(|b| b.open_time <= target)
            .filter(|b| target - b.open_time <= self.jitter)
            .filter(|b| b.open_time + self.timeframe.duration() <= now)
            .max_by_key(|b| b.open_time)
            .map(|b| b.close)
    }

    /// Fetch bars ending at `target` and apply [`Self::select_close`].
    ///
    /// The request window ends at the target bar, so no later bar is asked for.
    pub async fn price_at(
        &self,
        source: &dyn MarketDataSource,
        symbol: &str,
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<f64>> {
        let since = lookback_since(target, self.timeframe, PRICE_LOOKBACK_BARS);
        let bars = source
            .fetch_ohlcv(symbol, self.timeframe, since, PRICE_LOOKBACK_BARS + 1)
            .await?;
        let bars = bars_until(bars, target);
        Ok(self.select_close(&bars, target, now))
    }
}

/// `p1 / p0 - 1`; `None` unless both prices are positive and finite
pub fn forward_return(price_at_signal: f64, price_at_horizon: f64) -> Option<f64> {
    let valid = |p: f64| p.is_finite() && p > 0.0;
    if !valid(price_at_signal) || !valid(price_at_horizon) {
        return None;
    }
    Some(price_at_horizon / price_at_signal - 1.0)
}

/// Whether a forward return passes the sanity bound
pub fn within_bound(forward_return: f64, bound: f64) -> bool {
    forward_return.is_finite() && forward_return.abs() <= bound
}
