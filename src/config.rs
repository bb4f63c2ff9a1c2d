//! Configuration types for alpha-scanner

use crate::clock::Timeframe;
use crate::feed::{ExchangeConfig, SUPPORTED_TIMEFRAME_HOURS};
use crate::inference::InferenceConfig;
use crate::ranker::TierThresholds;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding `store.database_url`
pub const ENV_DATABASE_URL: &str = "SCANNER_DATABASE_URL";
/// Environment variable overriding `inference.url`
pub const ENV_INFERENCE_URL: &str = "INFERENCE_URL";
/// Environment variable overriding `telemetry.log_level`
pub const ENV_LOG_LEVEL: &str = "SCANNER_LOG_LEVEL";

/// Startup configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("store.database_url is not set (config file or SCANNER_DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("inference.url is not set (config file or INFERENCE_URL)")]
    MissingInferenceUrl,

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Scan pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Bar timeframe in hours
    #[serde(default = "default_timeframe")]
    pub timeframe_hours: Timeframe,

    /// Identifier of the deployed model, recorded on every run
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Bars in the rolling dollar-volume liquidity window
    #[serde(default = "default_liquidity_window")]
    pub liquidity_window: usize,

    /// Extra bars fetched beyond the longest feature window
    #[serde(default = "default_lookback_buffer")]
    pub lookback_buffer: usize,

    /// Candidates reported per tier and direction
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cumulative liquidity-rank fraction for the LARGE tier
    #[serde(default = "default_large_threshold")]
    pub large_threshold: f64,

    /// Cumulative liquidity-rank fraction for the MID tier
    #[serde(default = "default_mid_threshold")]
    pub mid_threshold: f64,
}

fn default_timeframe() -> Timeframe {
    Timeframe::FOUR_HOURS
}
fn default_model_id() -> String {
    "alpha-v1".to_string()
}
fn default_liquidity_window() -> usize {
    30
}
fn default_lookback_buffer() -> usize {
    10
}
fn default_top_k() -> usize {
    10
}
fn default_large_threshold() -> f64 {
    0.2
}
fn default_mid_threshold() -> f64 {
    0.6
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            timeframe_hours: default_timeframe(),
            model_id: default_model_id(),
            liquidity_window: default_liquidity_window(),
            lookback_buffer: default_lookback_buffer(),
            top_k: default_top_k(),
            large_threshold: default_large_threshold(),
            mid_threshold: default_mid_threshold(),
        }
    }
}

impl ScannerConfig {
    pub fn tier_thresholds(&self) -> TierThresholds {
        TierThresholds {
            large: self.large_threshold,
            mid: self.mid_threshold,
        }
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// sqlx connection URL, e.g. `sqlite://scanner.db`
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Forward-return evaluator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    /// Horizons evaluated for every run
    #[serde(default = "default_horizons")]
    pub horizons_hours: Vec<u32>,

    /// Only runs newer than this are considered
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Wait past `asof + horizon` before a run becomes eligible; at least one bar
    #[serde(default = "default_safety_margin_hours")]
    pub safety_margin_hours: u32,

    /// Forward returns with a larger absolute value are discarded
    #[serde(default = "default_return_bound")]
    pub return_bound: f64,

    /// Maximum distance between a target time and the open of the matched bar
    #[serde(default = "default_jitter_tolerance_secs")]
    pub jitter_tolerance_secs: u64,
}

fn default_horizons() -> Vec<u32> {
    vec![4]
}
fn default_lookback_days() -> u32 {
    7
}
fn default_safety_margin_hours() -> u32 {
    4
}
fn default_return_bound() -> f64 {
    5.0
}
fn default_jitter_tolerance_secs() -> u64 {
    60
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            horizons_hours: default_horizons(),
            lookback_days: default_lookback_days(),
            safety_margin_hours: default_safety_margin_hours(),
            return_bound: default_return_bound(),
            jitter_tolerance_secs: default_jitter_tolerance_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json_logs: bool,

    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// The bundled example configuration with environment overrides applied
    pub fn bundled() -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(include_str!("../config.toml.example"))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Whether a [`Config::load`] error means the file does not exist, as opposed
    /// to an unreadable or malformed file
    pub fn is_missing_file(err: &anyhow::Error) -> bool {
        err.downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Override fields from the environment; `lookup` maps a variable name to its value
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            self.store.database_url = Some(url);
        }
        if let Some(url) = lookup(ENV_INFERENCE_URL).filter(|v| !v.is_empty()) {
            self.inference.url = Some(url);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.telemetry.log_level = level;
        }
    }

    /// Reject configurations the scan pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database_url()?;
        self.inference_url()?;
        self.validate_settings()
    }

    /// Checks shared by every command; endpoints are not required
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        let scanner = &self.scanner;
        let timeframe = scanner.timeframe_hours.hours();
        if timeframe == 0 {
            return Err(invalid("scanner.timeframe_hours", "must be positive"));
        }
        if !SUPPORTED_TIMEFRAME_HOURS.contains(&timeframe) {
            return Err(invalid(
                "scanner.timeframe_hours",
                format!(
                    "{}h is not an exchange interval (one of {:?})",
                    timeframe, SUPPORTED_TIMEFRAME_HOURS
                ),
            ));
        }
        if !scanner.tier_thresholds().is_valid() {
            return Err(invalid(
                "scanner.large_threshold/mid_threshold",
                format!(
                    "need 0 < large <= mid <= 1, got {} / {}",
                    scanner.large_threshold, scanner.mid_threshold
                ),
            ));
        }
        if scanner.liquidity_window == 0 {
            return Err(invalid("scanner.liquidity_window", "must be positive"));
        }
        if scanner.top_k == 0 {
            return Err(invalid("scanner.top_k", "must be positive"));
        }

        let evaluator = &self.evaluator;
        if evaluator.horizons_hours.is_empty() || evaluator.horizons_hours.contains(&0) {
            return Err(invalid(
                "evaluator.horizons_hours",
                "need at least one positive horizon",
            ));
        }
        if let Some(h) = evaluator.horizons_hours.iter().find(|&&h| h % timeframe != 0) {
            return Err(invalid(
                "evaluator.horizons_hours",
                format!("{}h is not a whole number of {}h bars", h, timeframe),
            ));
        }
        if evaluator.safety_margin_hours < timeframe {
            return Err(invalid(
                "evaluator.safety_margin_hours",
                format!(
                    "must be at least one bar ({}h), got {}h",
                    timeframe,
                    evaluator.safety_margin_hours
                ),
            ));
        }
        if !(evaluator.return_bound.is_finite() && evaluator.return_bound > 0.0) {
            return Err(invalid("evaluator.return_bound", "must be a positive number"));
        }
        if evaluator.lookback_days == 0 {
            return Err(invalid("evaluator.lookback_days", "must be positive"));
        }

        Ok(())
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.store
            .database_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    pub fn inference_url(&self) -> Result<&str, ConfigError> {
        self.inference
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingInferenceUrl)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
