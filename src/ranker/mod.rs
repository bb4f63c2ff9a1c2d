//! Cross-sectional ranker
//!
//! Splits the scored universe into liquidity tiers, standardizes raw scores
//! within each tier with median/MAD and ranks them in both directions.

mod robust;
mod tier;

pub use robust::{effective_mad, mad, median, robust_zscores, MAD_SCALE, MIN_MAD};
pub use tier::{assign_tiers, Tier, TierThresholds};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One symbol at the closed bar, as handed to the ranker
#[derive(Debug, Clone, PartialEq)]
pub struct RankInput {
    pub symbol: String,
    pub liquidity_proxy: Option<f64>,
    pub raw_score: Option<f64>,
}

/// Ranked symbol within its tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub symbol: String,
    pub tier: Tier,
    /// Members of `tier` in this run
    pub tier_population: usize,
    pub raw_score: f64,
    pub standardized_score: f64,
    /// 1 = highest standardized score in the tier
    pub rank_long: usize,
    /// 1 = lowest standardized score in the tier
    pub rank_short: usize,
    pub liquidity_proxy: Option<f64>,
}

/// Top-K long and short symbols of one tier, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCandidates {
    pub tier: Tier,
    pub long: Vec<String>,
    pub short: Vec<String>,
}

/// Tiering and ranking parameters
#[derive(Debug, Clone, Copy)]
pub struct CrossSectionalRanker {
    thresholds: TierThresholds,
    top_k: usize,
}

impl Default for CrossSectionalRanker {
    fn default() -> Self {
        Self::new(TierThresholds::default(), 10)
    }
}

impl CrossSectionalRanker {
    pub fn new(thresholds: TierThresholds, top_k: usize) -> Self {
        Self { thresholds, top_k }
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank every scored input.
    ///
    /// Inputs without a finite score are dropped before tiering, so they count
    /// toward no tier. Output keeps the relative input order of the survivors.
    pub fn rank(&self, inputs: &[RankInput]) -> Vec<RankedRow> {
        let scored: Vec<(&RankInput, f64)> = inputs
            .iter()
            .filter_map(|input| match input.raw_score.filter(|s| s.is_finite()) {
                Some(score) => Some((input, score)),
                None => {
                    tracing::info!(symbol = %input.symbol, "Excluded from ranking: no score");
                    None
                }
            })
            .collect();

        let liquidity: Vec<Option<f64>> = scored.iter().map(|(i, _)| i.liquidity_proxy).collect();
        let tiers = assign_tiers(&liquidity, self.thresholds);

        let mut members: BTreeMap<Tier, Vec<usize>> = BTreeMap::new();
        for (pos, tier) in tiers.iter().enumerate() {
            members.entry(*tier).or_default().push(pos);
        }

        let mut standardized = vec![0.0; scored.len()];
        let mut rank_long = vec![0usize; scored.len()];
        let mut rank_short = vec![0usize; scored.len()];
        let mut population = vec![0usize; scored.len()];

        for (tier, positions) in &members {
            let raw: Vec<f64> = positions.iter().map(|&p| scored[p].1).collect();
            let z = robust_zscores(&raw);
            tracing::debug!(%tier, members = positions.len(), "Standardized tier");

            for (&pos, &value) in positions.iter().zip(&z) {
                standardized[pos] = value;
                population[pos] = positions.len();
            }

            let mut by_long: Vec<usize> = positions.clone();
            by_long.sort_by(|&a, &b| standardized[b].total_cmp(&standardized[a]));
            for (i, &pos) in by_long.iter().enumerate() {
                rank_long[pos] = i + 1;
            }

            let mut by_short: Vec<usize> = positions.clone();
            by_short.sort_by(|&a, &b| standardized[a].total_cmp(&standardized[b]));
            for (i, &pos) in by_short.iter().enumerate() {
                rank_short[pos] = i + 1;
            }
        }

        scored
            .iter()
            .enumerate()
            .map(|(pos, (input, score))| RankedRow {
                symbol: input.symbol.clone(),
                tier: tiers[pos],
                tier_population: population[pos],
                raw_score: *score,
                standardized_score: standardized[pos],
                rank_long: rank_long[pos],
                rank_short: rank_short[pos],
                liquidity_proxy: input.liquidity_proxy,
            })
            .collect()
    }

    /// Top-K long and short lists for every tier present in `ranked`
    pub fn candidates(&self, ranked: &[RankedRow]) -> Vec<TierCandidates> {
        Tier::ALL
            .iter()
            .filter_map(|&tier| {
                let mut rows: Vec<&RankedRow> = ranked.iter().filter(|r| r.tier == tier).collect();
                if rows.is_empty() {
                    return None;
                }

                rows.sort_by_key(|r| r.rank_long);
                let long: Vec<String> = rows.iter().take(self.top_k).map(|r| r.symbol.clone()).collect();

                rows.sort_by_key(|r| r.rank_short);
                let short: Vec<String> = rows.iter().take(self.top_k).map(|r| r.symbol.clone()).collect();

                Some(TierCandidates { tier, long, short })
            })
            .collect()
    }
}
