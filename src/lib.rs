//! alpha-scanner: cross-sectional alpha scanner for crypto perpetual futures
//!
//! This library provides the core components for:
//! - Closed-bar clock arithmetic
//! - Universe selection and OHLCV retrieval from Binance USDⓈ-M futures
//! - Versioned feature engineering
//! - Batched scoring against an external inference endpoint
//! - Liquidity tiering and robust cross-sectional ranking
//! - Immutable run snapshots in SQLite
//! - Forward-return evaluation and Parquet export
//! - Logging and Prometheus metrics

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod feed;
pub mod inference;
pub mod ranker;
pub mod scan;
pub mod snapshot;
pub mod telemetry;
