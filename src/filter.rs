//! Declarative filter and sort pipeline behind the facility tables.

use std::cmp::Ordering;

use serde::Serialize;

use crate::dataset::{Facility, OwnershipKind};
use crate::search;
use crate::tier::RiskTier;

/// Column a facility table can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Composite,
    Stars,
    Fines,
    Jeopardy,
    Staffing,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// A set of optional predicates; an unset field matches everything.
#[derive(Debug, Clone, Default)]
pub struct FacilityFilter {
    pub state: Option<String>,
    pub ownership: Option<OwnershipKind>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub min_tier: Option<RiskTier>,
    pub max_stars: Option<u8>,
    pub jeopardy_only: bool,
    pub query: Option<String>,
}

impl FacilityFilter {
    pub fn matches(&self, facility: &Facility) -> bool {
        if let Some(state) = &self.state {
            if !facility.state.eq_ignore_ascii_case(state.trim()) {
                return false;
            }
        }
        if let Some(kind) = self.ownership {
            if facility.ownership_kind() != kind {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if facility.composite < min {
                return false;
            }
        }
        if let Some(max) = self.max_score {
            if facility.composite > max {
                return false;
            }
        }
        if let Some(tier) = self.min_tier {
            if facility.tier() < tier {
                return false;
            }
        }
        if let Some(max) = self.max_stars {
            if !facility.is_rated() || facility.stars > max {
                return false;
            }
        }
        if self.jeopardy_only && !facility.has_jeopardy() {
            return false;
        }
        if let Some(query) = &self.query {
            if !search::matches(facility, query) {
                return false;
            }
        }
        true
    }
}

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            key: SortKey::Composite,
            direction: SortDirection::Desc,
        }
    }
}

impl Sort {
    pub fn compare(&self, a: &Facility, b: &Facility) -> Ordering {
        let ordering = match self.key {
            SortKey::Composite => a.composite.total_cmp(&b.composite),
            SortKey::Stars => a.stars.cmp(&b.stars),
            SortKey::Fines => a.total_fines.total_cmp(&b.total_fines),
            SortKey::Jeopardy => a.jeopardy_citations.cmp(&b.jeopardy_citations),
            SortKey::Staffing => a.total_hprd.total_cmp(&b.total_hprd),
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Filters, stable-sorts and truncates a facility view.
pub fn apply<'a>(
    facilities: impl IntoIterator<Item = &'a Facility>,
    filter: &FacilityFilter,
    sort: Sort,
    limit: Option<usize>,
) -> Vec<&'a Facility> {
    let mut rows: Vec<&Facility> = facilities.into_iter().filter(|f| filter.matches(f)).collect();
    rows.sort_by(|a, b| sort.compare(a, b));
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Facility> {
        let rows = [
            ("1", "Maple Grove", "PA", 72.0, 1, 0, "For profit - Corporation", 3.1),
            ("2", "Oak Terrace", "PA", 18.0, 5, 0, "Non profit - Corporation", 4.4),
            ("3", "birch house", "PA", 45.0, 2, 3, "For profit - Partnership", 3.6),
            ("4", "Cedar Point", "NJ", 61.0, 0, 1, "Government - City/county", 0.0),
        ];
        rows.iter()
            .map(|(ccn, name, state, composite, stars, jeopardy, ownership, hprd)| Facility {
                ccn: ccn.to_string(),
                name: name.to_string(),
                state: state.to_string(),
                composite: *composite,
                stars: *stars,
                jeopardy_citations: *jeopardy,
                ownership_type: ownership.to_string(),
                total_hprd: *hprd,
                ..Default::default()
            })
            .collect()
    }

    fn ccns(rows: &[&Facility]) -> Vec<String> {
        rows.iter().map(|f| f.ccn.clone()).collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let facilities = sample();
        let rows = apply(&facilities, &FacilityFilter::default(), Sort::default(), None);

        assert_eq!(ccns(&rows), vec!["1", "4", "3", "2"]);
    }

    #[test]
    fn test_predicates_compose() {
        let facilities = sample();
        let filter = FacilityFilter {
            state: Some("pa".to_string()),
            ownership: Some(OwnershipKind::ForProfit),
            min_score: Some(40.0),
            ..Default::default()
        };
        let rows = apply(&facilities, &filter, Sort::default(), None);

        assert_eq!(ccns(&rows), vec!["1", "3"]);
    }

    #[test]
    fn test_min_tier_and_jeopardy() {
        let facilities = sample();
        let filter = FacilityFilter {
            min_tier: Some(RiskTier::Critical),
            jeopardy_only: true,
            ..Default::default()
        };
        let rows = apply(&facilities, &filter, Sort::default(), None);

        assert_eq!(ccns(&rows), vec!["4"]);
    }

    #[test]
    fn test_max_stars_excludes_unrated() {
        let facilities = sample();
        let filter = FacilityFilter {
            max_stars: Some(2),
            ..Default::default()
        };
        let rows = apply(&facilities, &filter, Sort::default(), None);

        assert_eq!(ccns(&rows), vec!["1", "3"]);
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive() {
        let facilities = sample();
        let sort = Sort {
            key: SortKey::Name,
            direction: SortDirection::Asc,
        };
        let rows = apply(&facilities, &FacilityFilter::default(), sort, Some(2));

        assert_eq!(ccns(&rows), vec!["3", "4"]);
    }

    #[test]
    fn test_query_filter() {
        let facilities = sample();
        let filter = FacilityFilter {
            query: Some("TERRACE".to_string()),
            ..Default::default()
        };
        let rows = apply(&facilities, &filter, Sort::default(), None);

        assert_eq!(ccns(&rows), vec!["2"]);
    }
}
