//! Binance USDT-M futures REST client
//!
//! Any venue exposing the `/fapi/v1` kline and exchange-info endpoints works
//! through this client by pointing `base_url` at it.

use super::{Bar, Instrument, MarketDataSource};
use crate::clock::Timeframe;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Binance USDT-M futures REST base URL
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

/// Whole-hour kline intervals the endpoint accepts
pub const SUPPORTED_TIMEFRAME_HOURS: [u32; 7] = [1, 2, 4, 6, 8, 12, 24];

/// Maximum klines per request accepted by the endpoint
const MAX_KLINE_LIMIT: usize = 1500;

/// Configuration for the exchange client
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Unified-symbol suffix that selects the scanned universe
    #[serde(default = "default_symbol_suffix")]
    pub symbol_suffix: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    BINANCE_FUTURES_URL.to_string()
}
fn default_symbol_suffix() -> String {
    "/USDT:USDT".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            symbol_suffix: default_symbol_suffix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    contract_type: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    margin_asset: String,
}

/// REST client for listings and klines
pub struct BinanceFuturesClient {
    config: ExchangeConfig,
    client: Client,
}

impl BinanceFuturesClient {
    /// Create a client; fails only if the TLS backend cannot be initialised
    pub fn new(config: ExchangeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Convert exchange info into unified perpetual instruments
    fn parse_instruments(info: ExchangeInfo) -> Vec<Instrument> {
        info.symbols
            .into_iter()
            .filter(|s| s.contract_type == "PERPETUAL")
            .map(|s| Instrument {
                symbol: format!("{}/{}:{}", s.base_asset, s.quote_asset, s.margin_asset),
                exchange_id: s.symbol,
                active: s.status == "TRADING",
            })
            .collect()
    }

    /// Parse a kline array `[openTime, "o", "h", "l", "c", "v", closeTime, ...]`
    fn parse_kline(symbol: &str, row: &Value) -> Option<Bar> {
        let fields = row.as_array()?;
        let open_ms = fields.first()?.as_i64()?;
        let num = |i: usize| -> Option<f64> {
            let v = fields.get(i)?;
            v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        };

        Some(Bar {
            symbol: symbol.to_string(),
            open_time: Utc.timestamp_millis_opt(open_ms).single()?,
            open: num(1)?,
            high: num(2)?,
            low: num(3)?,
            close: num(4)?,
            volume: num(5)?,
        })
    }
}

/// Exchange-native id for a unified symbol: `BTC/USDT:USDT` → `BTCUSDT`
pub fn exchange_symbol(unified: &str) -> String {
    let pair = unified.split(':').next().unwrap_or(unified);
    pair.replace('/', "")
}

#[async_trait]
impl MarketDataSource for BinanceFuturesClient {
    async fn list_instruments(&self) -> anyhow::Result<Vec<Instrument>> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.config.base_url);
        tracing::debug!(url = %url, "Fetching exchange listing");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Exchange info error: {} - {}", status, body);
        }

        let info: ExchangeInfo = response.json().await?;
        Ok(Self::parse_instruments(info))
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<Bar>> {
        let url = format!("{}/fapi/v1/klines", self.config.base_url);
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", exchange_symbol(symbol)),
                ("interval", timeframe.interval()),
                ("startTime", since.timestamp_millis().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Kline error for {}: {} - {}", symbol, status, body);
        }

        let rows: Vec<Value> = response.json().await?;
        let bars: Vec<Bar> = rows
            .iter()
            .filter_map(|row| Self::parse_kline(symbol, row))
            .collect();

        if bars.len() != rows.len() {
            tracing::warn!(
                symbol = %symbol,
                dropped = rows.len() - bars.len(),
                "Dropped malformed klines"
            );
        }

        Ok(bars)
    }
}
