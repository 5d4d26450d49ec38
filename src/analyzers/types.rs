//! Data types produced by the aggregation pipeline.

use serde::Serialize;

use crate::tier::RiskTier;

/// Portfolio statistics for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerAggregate {
    pub owner: String,
    pub facility_count: usize,
    pub avg_composite: f64,
    /// Mean over rated facilities only.
    pub avg_stars: f64,
    pub total_fines: f64,
    pub jeopardy_facilities: usize,
    /// Rated facilities with fewer than two stars.
    pub low_star_facilities: usize,
    /// Counts of rated facilities by star rating; index 0 holds 1-star.
    pub star_histogram: [usize; 5],
    pub states: Vec<String>,
}

/// Number of facilities in each risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub low: usize,
    pub elevated: usize,
    pub high: usize,
    pub critical: usize,
}

impl TierCounts {
    pub fn add(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Low => self.low += 1,
            RiskTier::Elevated => self.elevated += 1,
            RiskTier::High => self.high += 1,
            RiskTier::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Elevated => self.elevated,
            RiskTier::High => self.high,
            RiskTier::Critical => self.critical,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.elevated + self.high + self.critical
    }
}

/// Rollup of every facility in one state (or the whole country).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateAggregate {
    pub state: String,
    pub facility_count: usize,
    pub avg_composite: f64,
    /// Mean over rated facilities only.
    pub avg_stars: f64,
    /// Mean over facilities that report staffing.
    pub avg_total_hprd: f64,
    pub total_fines: f64,
    pub jeopardy_facilities: usize,
    /// Fraction (0.0-1.0) of facilities under for-profit ownership.
    pub for_profit_share: f64,
    pub below_staffing_minimum: usize,
    pub tiers: TierCounts,
}
