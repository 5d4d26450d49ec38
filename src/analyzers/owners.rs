use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::analyzers::types::OwnerAggregate;
use crate::analyzers::utility::mean;
use crate::dataset::Facility;

/// Group key for facilities that publish no owner name.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Criterion used to order the "worst owners" leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OwnerRanking {
    /// Most facilities rated below two stars.
    LowStars,
    /// Highest summed fines.
    Fines,
    /// Most facilities with jeopardy citations.
    Jeopardy,
    /// Highest mean composite score.
    Composite,
}

#[derive(Default)]
struct OwnerAccumulator {
    composites: Vec<f64>,
    ratings: Vec<f64>,
    total_fines: f64,
    jeopardy_facilities: usize,
    low_star_facilities: usize,
    star_histogram: [usize; 5],
    states: BTreeSet<String>,
}

fn owner_key(facility: &Facility) -> &str {
    let owner = facility.owner_name.trim();
    if owner.is_empty() { UNKNOWN_OWNER } else { owner }
}

/// Groups facilities by owner name in a single pass.
///
/// Every input facility lands in exactly one group, so the facility counts
/// sum to the input length and the fines sum to the input's total fines.
/// The result is sorted by owner name.
pub fn aggregate_owners<'a>(facilities: impl IntoIterator<Item = &'a Facility>) -> Vec<OwnerAggregate> {
    let mut groups: HashMap<String, OwnerAccumulator> = HashMap::new();

    for facility in facilities {
        let entry = groups.entry(owner_key(facility).to_string()).or_default();

        entry.composites.push(facility.composite);
        entry.total_fines += facility.total_fines;
        if facility.has_jeopardy() {
            entry.jeopardy_facilities += 1;
        }
        if facility.is_rated() {
            entry.ratings.push(facility.stars as f64);
            entry.star_histogram[facility.stars as usize - 1] += 1;
            if facility.stars < 2 {
                entry.low_star_facilities += 1;
            }
        }
        if !facility.state.is_empty() {
            entry.states.insert(facility.state.clone());
        }
    }

    let mut aggregates: Vec<OwnerAggregate> = groups
        .into_iter()
        .map(|(owner, acc)| OwnerAggregate {
            owner,
            facility_count: acc.composites.len(),
            avg_composite: mean(&acc.composites),
            avg_stars: mean(&acc.ratings),
            total_fines: acc.total_fines,
            jeopardy_facilities: acc.jeopardy_facilities,
            low_star_facilities: acc.low_star_facilities,
            star_histogram: acc.star_histogram,
            states: acc.states.into_iter().collect(),
        })
        .collect();

    aggregates.sort_by(|a, b| a.owner.cmp(&b.owner));
    aggregates
}

fn compare_by(criterion: OwnerRanking, a: &OwnerAggregate, b: &OwnerAggregate) -> Ordering {
    match criterion {
        OwnerRanking::LowStars => b.low_star_facilities.cmp(&a.low_star_facilities),
        OwnerRanking::Fines => b.total_fines.total_cmp(&a.total_fines),
        OwnerRanking::Jeopardy => b.jeopardy_facilities.cmp(&a.jeopardy_facilities),
        OwnerRanking::Composite => b.avg_composite.total_cmp(&a.avg_composite),
    }
}

/// Orders owners worst-first by `criterion`, keeping only portfolios of at
/// least `min_facilities` and at most `limit` entries.
///
/// Ties break on facility count (larger first), then owner name.
pub fn rank_owners(
    aggregates: Vec<OwnerAggregate>,
    criterion: OwnerRanking,
    min_facilities: usize,
    limit: usize,
) -> Vec<OwnerAggregate> {
    let mut ranked: Vec<OwnerAggregate> = aggregates
        .into_iter()
        .filter(|a| a.facility_count >= min_facilities)
        .collect();

    ranked.sort_by(|a, b| {
        compare_by(criterion, a, b)
            .then_with(|| b.facility_count.cmp(&a.facility_count))
            .then_with(|| a.owner.cmp(&b.owner))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(ccn: &str, owner: &str, stars: u8, fines: f64, jeopardy: u32) -> Facility {
        Facility {
            ccn: ccn.to_string(),
            name: format!("Facility {ccn}"),
            state: "OH".to_string(),
            owner_name: owner.to_string(),
            stars,
            composite: stars as f64 * 10.0,
            total_fines: fines,
            jeopardy_citations: jeopardy,
            ..Default::default()
        }
    }

    fn sample() -> Vec<Facility> {
        vec![
            facility("1", "Acme Health", 1, 10_000.0, 1),
            facility("2", "Acme Health", 3, 2_500.5, 0),
            facility("3", "Acme Health", 0, 0.0, 2),
            facility("4", "Beacon Care", 5, 0.0, 0),
            facility("5", "", 1, 800.0, 0),
            facility("6", "  ", 2, 120_000.0, 3),
        ]
    }

    #[test]
    fn test_counts_and_fines_partition_the_input() {
        let facilities = sample();
        let aggregates = aggregate_owners(&facilities);

        let count: usize = aggregates.iter().map(|a| a.facility_count).sum();
        let fines: f64 = aggregates.iter().map(|a| a.total_fines).sum();
        let expected_fines: f64 = facilities.iter().map(|f| f.total_fines).sum();

        assert_eq!(count, facilities.len());
        assert!((fines - expected_fines).abs() < 1e-9);
    }

    #[test]
    fn test_blank_owner_groups_under_unknown() {
        let aggregates = aggregate_owners(&sample());
        let unknown = aggregates.iter().find(|a| a.owner == UNKNOWN_OWNER).unwrap();

        assert_eq!(unknown.facility_count, 2);
        assert_eq!(unknown.total_fines, 120_800.0);
    }

    #[test]
    fn test_owner_statistics() {
        let aggregates = aggregate_owners(&sample());
        let acme = aggregates.iter().find(|a| a.owner == "Acme Health").unwrap();

        assert_eq!(acme.facility_count, 3);
        assert_eq!(acme.jeopardy_facilities, 2);
        assert_eq!(acme.low_star_facilities, 1);
        assert_eq!(acme.star_histogram, [1, 0, 1, 0, 0]);
        // unrated facility is excluded from the star mean
        assert_eq!(acme.avg_stars, 2.0);
        assert!((acme.avg_composite - 40.0 / 3.0).abs() < 1e-9);
        assert_eq!(acme.states, vec!["OH".to_string()]);
    }

    #[test]
    fn test_rank_by_fines() {
        let ranked = rank_owners(aggregate_owners(&sample()), OwnerRanking::Fines, 1, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].owner, UNKNOWN_OWNER);
        assert_eq!(ranked[1].owner, "Acme Health");
    }

    #[test]
    fn test_rank_ties_break_on_portfolio_size() {
        let ranked = rank_owners(aggregate_owners(&sample()), OwnerRanking::LowStars, 1, 10);

        // Acme and Unknown both have one low-star facility; Acme is larger
        assert_eq!(ranked[0].owner, "Acme Health");
        assert_eq!(ranked[1].owner, UNKNOWN_OWNER);
        assert_eq!(ranked[2].owner, "Beacon Care");
    }

    #[test]
    fn test_rank_respects_min_facilities() {
        let ranked = rank_owners(aggregate_owners(&sample()), OwnerRanking::Jeopardy, 3, 10);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].owner, "Acme Health");
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_owners(&Vec::<Facility>::new()).is_empty());
    }
}
