//! Deterministic market, scorer and store fixtures

use alpha_scanner::clock::Timeframe;
use alpha_scanner::error::Result;
use alpha_scanner::feed::{Bar, Instrument, MarketDataSource};
use alpha_scanner::inference::{InferenceRequest, InferenceScore, Scorer};
use alpha_scanner::snapshot::SqliteStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SUFFIX: &str = "/USDT:USDT";

/// 2025-03-01T09:30Z; the last closed 4h bar opened at 04:00
pub fn scan_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
}

pub fn boundary() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 4, 0, 0).unwrap()
}

pub fn symbol(i: usize) -> String {
    format!("S{:02}{}", i, SUFFIX)
}

/// Synthetic 4h market.
///
/// Symbol `i` trades around `10 * (i + 1)` with dollar volume falling as `i`
/// grows, so `S00` is the most liquid and `S09` the least.
pub struct SyntheticMarket {
    instruments: Vec<Instrument>,
    bars: HashMap<String, Vec<Bar>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl SyntheticMarket {
    /// `count` symbols with history from `bars_before` bars ahead of the
    /// boundary through two days after it
    pub fn new(count: usize, bars_before: usize) -> Self {
        let tf = Timeframe::FOUR_HOURS.duration();
        let first = boundary() - tf * bars_before as i32;
        let last = boundary() + Duration::days(2);

        let mut instruments = Vec::new();
        let mut bars = HashMap::new();
        for i in 0..count {
            let sym = symbol(i);
            let base = 10.0 * (i + 1) as f64;
            let volume = (10 - i % 10) as f64 * 1000.0 / (i + 1) as f64;

            let mut series = Vec::new();
            let mut t = first;
            let mut k = 0i32;
            while t <= last {
                let wiggle = if k % 2 == 0 { 1.004 } else { 0.997 };
                let close = base * 1.001f64.powi(k) * wiggle;
                series.push(Bar {
                    symbol: sym.clone(),
                    open_time: t,
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume,
                });
                t += tf;
                k += 1;
            }

            instruments.push(Instrument {
                symbol: sym.clone(),
                exchange_id: sym.replace("/USDT:USDT", "USDT"),
                active: true,
            });
            bars.insert(sym, series);
        }

        // Outside the universe
        instruments.push(Instrument {
            symbol: "OLD/USDT:USDT".to_string(),
            exchange_id: "OLDUSDT".to_string(),
            active: false,
        });
        instruments.push(Instrument {
            symbol: "ETH/USDC:USDC".to_string(),
            exchange_id: "ETHUSDC".to_string(),
            active: true,
        });

        Self {
            instruments,
            bars,
            failing: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, symbol: String) -> Self {
        self.failing.insert(symbol);
        self
    }

    pub fn close_at(&self, symbol: &str, open_time: DateTime<Utc>) -> f64 {
        self.bars[symbol]
            .iter()
            .find(|b| b.open_time == open_time)
            .map(|b| b.close)
            .unwrap()
    }

    pub fn requests(&self) -> Vec<(String, DateTime<Utc>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataSource for SyntheticMarket {
    async fn list_instruments(&self) -> anyhow::Result<Vec<Instrument>> {
        Ok(self.instruments.clone())
    }

    /// Ignores `limit` and returns everything from `since`, including bars
    /// that have not closed yet
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        since: DateTime<Utc>,
        _limit: usize,
    ) -> anyhow::Result<Vec<Bar>> {
        self.requests.lock().unwrap().push((symbol.to_string(), since));
        if self.failing.contains(symbol) {
            anyhow::bail!("HTTP 503 for {}", symbol);
        }
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| bars.iter().filter(|b| b.open_time >= since).cloned().collect())
            .unwrap_or_default())
    }
}

/// Scores each row by its `ema12` value and counts calls
#[derive(Default)]
pub struct EmaScorer {
    calls: AtomicUsize,
    rows_seen: AtomicUsize,
}

impl EmaScorer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for EmaScorer {
    async fn score(&self, request: &InferenceRequest) -> Result<Vec<InferenceScore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rows_seen.fetch_add(request.len(), Ordering::SeqCst);
        Ok(request
            .rows
            .iter()
            .map(|row| InferenceScore {
                raw_alpha: row.get("ema12").copied(),
            })
            .collect())
    }
}

pub async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::connect("sqlite::memory:", 1).await.unwrap())
}
