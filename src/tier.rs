use serde::Serialize;

/// Lower bound (inclusive) of the elevated tier.
pub const ELEVATED_THRESHOLD: f64 = 20.0;
/// Lower bound (inclusive) of the high tier.
pub const HIGH_THRESHOLD: f64 = 40.0;
/// Lower bound (inclusive) of the critical tier.
pub const CRITICAL_THRESHOLD: f64 = 60.0;

/// Ordinal risk tier of a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Elevated,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Low,
        RiskTier::Elevated,
        RiskTier::High,
        RiskTier::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Elevated => "Elevated",
            RiskTier::High => "High",
            RiskTier::Critical => "Critical",
        }
    }

    /// Display colour used for badges and map fills.
    pub fn color(&self) -> &'static str {
        match self {
            RiskTier::Low => "#16a34a",
            RiskTier::Elevated => "#ca8a04",
            RiskTier::High => "#ea580c",
            RiskTier::Critical => "#dc2626",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a composite score (0-100) onto its risk tier.
///
/// | Range        | Tier     |
/// |--------------|----------|
/// | >= 60        | Critical |
/// | >= 40        | High     |
/// | >= 20        | Elevated |
/// | < 20 or NaN  | Low      |
pub fn tier(score: f64) -> RiskTier {
    match score {
        s if s >= CRITICAL_THRESHOLD => RiskTier::Critical,
        s if s >= HIGH_THRESHOLD => RiskTier::High,
        s if s >= ELEVATED_THRESHOLD => RiskTier::Elevated,
        _ => RiskTier::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier(0.0), RiskTier::Low);
        assert_eq!(tier(19.9), RiskTier::Low);
        assert_eq!(tier(20.0), RiskTier::Elevated);
        assert_eq!(tier(39.9), RiskTier::Elevated);
        assert_eq!(tier(40.0), RiskTier::High);
        assert_eq!(tier(59.9), RiskTier::High);
        assert_eq!(tier(60.0), RiskTier::Critical);
        assert_eq!(tier(100.0), RiskTier::Critical);
    }

    #[test]
    fn test_tier_is_total() {
        assert_eq!(tier(f64::NAN), RiskTier::Low);
        assert_eq!(tier(f64::NEG_INFINITY), RiskTier::Low);
        assert_eq!(tier(-5.0), RiskTier::Low);
        assert_eq!(tier(f64::INFINITY), RiskTier::Critical);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let mut previous = tier(-1.0);
        for step in 0..=1100 {
            let current = tier(step as f64 / 10.0);
            assert!(current >= previous, "tier decreased at {}", step as f64 / 10.0);
            previous = current;
        }
    }

    #[test]
    fn test_colors_are_distinct() {
        let colors: std::collections::HashSet<&str> =
            RiskTier::ALL.iter().map(|t| t.color()).collect();
        assert_eq!(colors.len(), 4);
    }
}
