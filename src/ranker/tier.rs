//! Liquidity tiering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Liquidity tier of a symbol within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Large,
    Mid,
    Small,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Large, Tier::Mid, Tier::Small];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Large => "LARGE",
            Tier::Mid => "MID",
            Tier::Small => "SMALL",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LARGE" => Ok(Tier::Large),
            "MID" => Ok(Tier::Mid),
            "SMALL" => Ok(Tier::Small),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Cumulative rank fractions separating the tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Top fraction of the universe by liquidity → LARGE
    pub large: f64,
    /// Cumulative fraction up to which symbols are MID
    pub mid: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            large: 0.2,
            mid: 0.6,
        }
    }
}

impl TierThresholds {
    pub fn is_valid(&self) -> bool {
        self.large.is_finite()
            && self.mid.is_finite()
            && self.large > 0.0
            && self.large <= self.mid
            && self.mid <= 1.0
    }
}

/// Tier per input position.
///
/// Symbols are ranked by descending liquidity with missing or non-finite values
/// counted as zero; equal liquidity keeps input order. Rank `r` (1-based) is LARGE
/// when `r <= large * n`, MID when `r <= mid * n`, SMALL otherwise.
pub fn assign_tiers(liquidity: &[Option<f64>], thresholds: TierThresholds) -> Vec<Tier> {
    let n = liquidity.len();
    let filled: Vec<f64> = liquidity
        .iter()
        .map(|l| l.filter(|v| v.is_finite()).unwrap_or(0.0))
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    // Stable sort keeps input order among ties
    order.sort_by(|&a, &b| filled[b].total_cmp(&filled[a]));

    let large_cut = thresholds.large * n as f64;
    let mid_cut = thresholds.mid * n as f64;

    let mut tiers = vec![Tier::Small; n];
    for (i, &pos) in order.iter().enumerate() {
        let rank = (i + 1) as f64;
        tiers[pos] = if rank <= large_cut {
            Tier::Large
        } else if rank <= mid_cut {
            Tier::Mid
        } else {
            Tier::Small
        };
    }
    tiers
}
