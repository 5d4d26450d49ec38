use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analyzers::owners::{OwnerRanking, aggregate_owners, rank_owners};
use crate::analyzers::states::aggregate_state;
use crate::compliance::review_state;
use crate::dataset::Facility;
use crate::filter::{self, FacilityFilter, Sort};
use crate::tier::RiskTier;

/// Number of entries listed in each ranked section.
pub const SECTION_LIMIT: usize = 10;

fn money(value: f64) -> String {
    let whole = format!("{:.0}", value.abs());
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Builds a markdown report covering one state's facilities.
pub fn build_report(state: &str, facilities: &[Facility], generated_at: DateTime<Utc>) -> String {
    let summary = aggregate_state(state, facilities);
    let toolkit = review_state(facilities);
    let owners = rank_owners(
        aggregate_owners(facilities),
        OwnerRanking::LowStars,
        2,
        SECTION_LIMIT,
    );
    let riskiest = filter::apply(
        facilities,
        &FacilityFilter::default(),
        Sort::default(),
        Some(SECTION_LIMIT),
    );

    let mut output = String::new();

    let _ = writeln!(output, "# Nursing Home Risk Report: {}", summary.state);
    let _ = writeln!(
        output,
        "Generated {} from {} facilities",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        summary.facility_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if summary.facility_count == 0 {
        let _ = writeln!(output, "No facilities recorded for this state.");
        return output;
    }

    let _ = writeln!(output, "- Average composite score: {:.1}", summary.avg_composite);
    let _ = writeln!(output, "- Average star rating: {:.1}", summary.avg_stars);
    let _ = writeln!(
        output,
        "- Average total staffing: {:.2} HPRD",
        summary.avg_total_hprd
    );
    let _ = writeln!(output, "- Total fines: {}", money(summary.total_fines));
    let _ = writeln!(
        output,
        "- Facilities with jeopardy citations: {}",
        summary.jeopardy_facilities
    );
    let _ = writeln!(
        output,
        "- For-profit ownership: {:.0}%",
        summary.for_profit_share * 100.0
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Tiers");
    for tier in RiskTier::ALL.iter().rev() {
        let _ = writeln!(output, "- {}: {}", tier, summary.tiers.get(*tier));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Facilities");
    for facility in &riskiest {
        let _ = writeln!(
            output,
            "- {} ({}, CCN {}) score {:.1} [{}], {} stars, fines {}",
            facility.name,
            facility.city,
            facility.ccn,
            facility.composite,
            facility.tier(),
            facility.stars,
            money(facility.total_fines)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Owners With Most Low-Rated Facilities");
    if owners.is_empty() {
        let _ = writeln!(output, "No multi-facility owners in this state.");
    } else {
        for owner in &owners {
            let _ = writeln!(
                output,
                "- {}: {} of {} facilities below two stars, fines {}, avg score {:.1}",
                owner.owner,
                owner.low_star_facilities,
                owner.facility_count,
                money(owner.total_fines),
                owner.avg_composite
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Staffing and Ownership Findings");
    let _ = writeln!(
        output,
        "{} of {} facilities fall below a staffing minimum; {} carry an ownership red flag; {} report no staffing data.",
        toolkit.staffing_noncompliant, toolkit.reviewed, toolkit.red_flags, toolkit.missing_staffing_data
    );
    for item in toolkit.flagged.iter().take(SECTION_LIMIT) {
        let reasons: Vec<String> = item.findings.iter().map(|f| f.describe()).collect();
        let _ = writeln!(
            output,
            "- {} (CCN {}): {}",
            item.facility.name,
            item.facility.ccn,
            reasons.join("; ")
        );
    }

    output
}
