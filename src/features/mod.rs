//! Feature engine
//!
//! The feature definition the model was trained against lives in exactly one
//! place, [`FeatureSpec::V1`]. The engine, the inference payload builder and the
//! validity check all read it from there.

mod engine;

pub use engine::FeatureEngine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engineered features, named as the model expects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Simple close-to-close return
    Ret1,
    /// Unadjusted EMA of close
    Ema12,
    /// Rolling sample std of `Ret1`
    Rv24,
    /// Rolling mean dollar volume (liquidity proxy)
    Adv,
}

impl Feature {
    /// Wire name in the inference payload
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Ret1 => "ret_1",
            Feature::Ema12 => "ema12",
            Feature::Rv24 => "rv_24",
            Feature::Adv => "adv",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Versioned, frozen feature definition.
///
/// Changing any field breaks compatibility with the deployed model; add a new
/// version instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub version: &'static str,
    /// EMA span (α = 2 / (span + 1))
    pub ema_span: usize,
    /// Realized volatility window in bars
    pub vol_window: usize,
    /// Bars ending at the scored bar that model features are computed from.
    /// Fixes the EMA seed, so fetching deeper history never moves a value.
    pub history_bars: usize,
    /// Features sent to the scorer, in order
    pub inference_features: &'static [Feature],
}

impl FeatureSpec {
    pub const V1: FeatureSpec = FeatureSpec {
        version: "v1",
        ema_span: 12,
        vol_window: 24,
        history_bars: 40,
        inference_features: &[Feature::Ema12, Feature::Rv24],
    };

    /// EMA smoothing factor
    pub fn ema_alpha(&self) -> f64 {
        2.0 / (self.ema_span as f64 + 1.0)
    }

    /// Bars required before every feature can be present, given the liquidity window.
    /// `Ret1` costs one bar, so the volatility window needs `vol_window + 1`.
    pub fn min_history(&self, liquidity_window: usize) -> usize {
        self.history_bars
            .max(self.vol_window + 1)
            .max(liquidity_window)
    }

    /// A row is valid iff every inference feature is present and finite
    pub fn is_valid(&self, row: &FeatureRow) -> bool {
        self.inference_features
            .iter()
            .all(|f| row.get(*f).is_some_and(f64::is_finite))
    }
}

/// Features for one symbol at one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub bar_time: DateTime<Utc>,
    pub close: f64,
    pub ret_1: Option<f64>,
    pub ema12: Option<f64>,
    pub rv_24: Option<f64>,
    pub adv: Option<f64>,
}

impl FeatureRow {
    /// Value of a feature, `None` while its window is incomplete
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Ret1 => self.ret_1,
            Feature::Ema12 => self.ema12,
            Feature::Rv24 => self.rv_24,
            Feature::Adv => self.adv,
        }
    }

    /// Liquidity proxy used for tiering
    pub fn liquidity_proxy(&self) -> Option<f64> {
        self.adv
    }
}
