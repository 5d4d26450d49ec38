use serde::Serialize;

use crate::analyzers::types::{StateAggregate, TierCounts};
use crate::analyzers::utility::{mean, share};
use crate::compliance::is_understaffed;
use crate::dataset::{Dataset, Facility};

/// Label used for the dataset-wide rollup.
pub const NATIONAL: &str = "US";

/// Criterion used to order the state rollup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StateRanking {
    Composite,
    Fines,
    Jeopardy,
    ForProfit,
}

/// Aggregates one state's facilities.
pub fn aggregate_state<'a>(
    state: &str,
    facilities: impl IntoIterator<Item = &'a Facility>,
) -> StateAggregate {
    let mut composites = Vec::new();
    let mut ratings = Vec::new();
    let mut staffing = Vec::new();
    let mut total_fines = 0.0;
    let mut jeopardy_facilities = 0;
    let mut for_profit = 0;
    let mut below_staffing_minimum = 0;
    let mut tiers = TierCounts::default();

    for facility in facilities {
        composites.push(facility.composite);
        if facility.is_rated() {
            ratings.push(facility.stars as f64);
        }
        if facility.total_hprd > 0.0 {
            staffing.push(facility.total_hprd);
        }
        total_fines += facility.total_fines;
        if facility.has_jeopardy() {
            jeopardy_facilities += 1;
        }
        if facility.is_for_profit() {
            for_profit += 1;
        }
        if is_understaffed(facility) {
            below_staffing_minimum += 1;
        }
        tiers.add(facility.tier());
    }

    StateAggregate {
        state: state.to_string(),
        facility_count: composites.len(),
        avg_composite: mean(&composites),
        avg_stars: mean(&ratings),
        avg_total_hprd: mean(&staffing),
        total_fines,
        jeopardy_facilities,
        for_profit_share: share(for_profit, composites.len()),
        below_staffing_minimum,
        tiers,
    }
}

/// One rollup per state in the dataset, in state-code order.
pub fn aggregate_states(dataset: &Dataset) -> Vec<StateAggregate> {
    dataset
        .states()
        .map(|(code, facilities)| aggregate_state(code, facilities))
        .collect()
}

/// Rollup over every facility in the dataset.
pub fn aggregate_national(dataset: &Dataset) -> StateAggregate {
    aggregate_state(NATIONAL, dataset.facilities())
}

/// Orders states worst-first by `criterion`; ties break on state code.
pub fn rank_states(
    mut aggregates: Vec<StateAggregate>,
    criterion: StateRanking,
) -> Vec<StateAggregate> {
    aggregates.sort_by(|a, b| {
        let primary = match criterion {
            StateRanking::Composite => b.avg_composite.total_cmp(&a.avg_composite),
            StateRanking::Fines => b.total_fines.total_cmp(&a.total_fines),
            StateRanking::Jeopardy => b.jeopardy_facilities.cmp(&a.jeopardy_facilities),
            StateRanking::ForProfit => b.for_profit_share.total_cmp(&a.for_profit_share),
        };
        primary.then_with(|| a.state.cmp(&b.state))
    });
    aggregates
}
