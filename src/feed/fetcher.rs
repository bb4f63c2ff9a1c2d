//! Closed-bar-bounded universe fetch
//!
//! Symbols are fetched sequentially. A failing symbol is logged and dropped;
//! only an entirely empty universe is fatal.

use super::{Bar, BarSeries, Instrument, MarketDataSource};
use crate::clock::Timeframe;
use crate::error::{Result, ScanError};
use crate::telemetry::{record_count, CounterMetric};
use chrono::{DateTime, Utc};

/// Per-run fetch accounting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Symbols requested
    pub attempted: usize,
    /// Symbols that produced at least one bar at or before the boundary
    pub fetched: usize,
    /// Symbols that answered with no usable bars
    pub empty: usize,
    /// Symbols whose request failed
    pub failed: usize,
}

/// Bars for every symbol that survived the fetch, in universe order
#[derive(Debug, Clone)]
pub struct FetchedUniverse {
    pub series: Vec<BarSeries>,
    pub report: FetchReport,
}

/// Active instruments whose unified symbol ends with `suffix`, sorted so the
/// universe order is identical run over run
pub fn select_universe(instruments: &[Instrument], suffix: &str) -> Vec<String> {
    let mut symbols: Vec<String> = instruments
        .iter()
        .filter(|i| i.active && i.symbol.ends_with(suffix))
        .map(|i| i.symbol.clone())
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

/// Open time of the first bar needed so that `bars` bars precede `boundary`
pub fn lookback_since(
    boundary: DateTime<Utc>,
    timeframe: Timeframe,
    bars: usize,
) -> DateTime<Utc> {
    boundary - timeframe.duration() * bars as i32
}

/// Sort by open time, drop duplicates, and cut everything after `cutoff`
pub(crate) fn bars_until(mut bars: Vec<Bar>, cutoff: DateTime<Utc>) -> Vec<Bar> {
    bars.retain(|b| b.open_time <= cutoff);
    bars.sort_by_key(|b| b.open_time);
    bars.dedup_by_key(|b| b.open_time);
    bars
}

/// Fetch `lookback_bars` bars of history ending at `boundary` for each symbol.
///
/// Bars with an open time after `boundary` are discarded even if the source
/// returns them.
pub async fn fetch_universe(
    source: &dyn MarketDataSource,
    symbols: &[String],
    timeframe: Timeframe,
    boundary: DateTime<Utc>,
    lookback_bars: usize,
) -> Result<FetchedUniverse> {
    let since = lookback_since(boundary, timeframe, lookback_bars);
    let limit = lookback_bars + 1;

    let mut report = FetchReport {
        attempted: symbols.len(),
        ..Default::default()
    };
    let mut series = Vec::with_capacity(symbols.len());

    tracing::info!(
        symbols = symbols.len(),
        since = %since,
        boundary = %boundary,
        "Fetching OHLCV"
    );

    for symbol in symbols {
        let bars = match source.fetch_ohlcv(symbol, timeframe, since, limit).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "OHLCV fetch failed, dropping symbol");
                report.failed += 1;
                continue;
            }
        };

        let bars = bars_until(bars, boundary);
        if bars.is_empty() {
            tracing::debug!(symbol = %symbol, "No bars at or before boundary");
            report.empty += 1;
            continue;
        }

        report.fetched += 1;
        series.push(BarSeries {
            symbol: symbol.clone(),
            bars,
        });
    }

    record_count(CounterMetric::SymbolsFetched, report.fetched as u64);
    record_count(CounterMetric::FetchFailures, report.failed as u64);

    if series.is_empty() {
        return Err(ScanError::EmptyUniverse {
            attempted: report.attempted,
        });
    }

    Ok(FetchedUniverse { series, report })
}
