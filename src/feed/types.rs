//! Market data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Unified symbol (e.g., "BTC/USDT:USDT")
    pub symbol: String,
    /// Bar open time
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A tradable instrument from the exchange listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unified symbol (BASE/QUOTE:SETTLE)
    pub symbol: String,
    /// Exchange-native identifier (e.g., "BTCUSDT")
    pub exchange_id: String,
    /// Whether the exchange currently lists it as trading
    pub active: bool,
}

/// Time-ordered bars for one symbol
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// Last bar in the series
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
