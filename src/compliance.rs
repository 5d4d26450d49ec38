//! Staffing and ownership compliance review for a state's facilities.
//!
//! Thresholds follow the federal minimum staffing standard. A staffing
//! metric of zero means the facility did not report it and is never flagged.

use serde::Serialize;

use crate::dataset::Facility;

/// Minimum total nurse staffing, hours per resident day.
pub const TOTAL_HPRD_MINIMUM: f64 = 3.48;
/// Minimum registered-nurse staffing, hours per resident day.
pub const RN_HPRD_MINIMUM: f64 = 0.55;
/// Minimum nurse-aide staffing, hours per resident day.
pub const CNA_HPRD_MINIMUM: f64 = 2.45;

/// Owner portfolio size from which a for-profit operator is scrutinised.
pub const RED_FLAG_PORTFOLIO_SIZE: u32 = 5;
/// Fine total above which a facility counts as heavily penalised.
pub const RED_FLAG_FINES: f64 = 50_000.0;

/// A single reason a facility was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    TotalStaffing { hprd: f64 },
    RnStaffing { hprd: f64 },
    CnaStaffing { hprd: f64 },
    OwnershipRedFlag,
}

impl Finding {
    pub fn describe(&self) -> String {
        match self {
            Finding::TotalStaffing { hprd } => {
                format!("total staffing {hprd:.2} HPRD below {TOTAL_HPRD_MINIMUM}")
            }
            Finding::RnStaffing { hprd } => {
                format!("RN staffing {hprd:.2} HPRD below {RN_HPRD_MINIMUM}")
            }
            Finding::CnaStaffing { hprd } => {
                format!("CNA staffing {hprd:.2} HPRD below {CNA_HPRD_MINIMUM}")
            }
            Finding::OwnershipRedFlag => "for-profit multi-facility owner with serious issues".to_string(),
        }
    }
}

fn below(value: f64, minimum: f64) -> bool {
    value > 0.0 && value < minimum
}

/// True when reported total staffing falls strictly below the minimum.
pub fn is_understaffed(facility: &Facility) -> bool {
    below(facility.total_hprd, TOTAL_HPRD_MINIMUM)
}

/// Staffing findings for a facility, one per metric under its threshold.
pub fn staffing_findings(facility: &Facility) -> Vec<Finding> {
    let mut findings = Vec::new();

    if below(facility.total_hprd, TOTAL_HPRD_MINIMUM) {
        findings.push(Finding::TotalStaffing {
            hprd: facility.total_hprd,
        });
    }
    if below(facility.rn_hprd, RN_HPRD_MINIMUM) {
        findings.push(Finding::RnStaffing {
            hprd: facility.rn_hprd,
        });
    }
    if below(facility.cna_hprd, CNA_HPRD_MINIMUM) {
        findings.push(Finding::CnaStaffing {
            hprd: facility.cna_hprd,
        });
    }

    findings
}

/// For-profit, part of a portfolio of five or more, and showing jeopardy
/// citations, fines above $50K, or understaffing.
pub fn is_ownership_red_flag(facility: &Facility) -> bool {
    facility.is_for_profit()
        && facility.portfolio_size >= RED_FLAG_PORTFOLIO_SIZE
        && (facility.has_jeopardy()
            || facility.total_fines > RED_FLAG_FINES
            || is_understaffed(facility))
}

/// A facility together with every reason it was flagged.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedFacility<'a> {
    pub facility: &'a Facility,
    pub findings: Vec<Finding>,
}

impl FlaggedFacility<'_> {
    pub fn is_staffing_noncompliant(&self) -> bool {
        self.findings
            .iter()
            .any(|f| !matches!(f, Finding::OwnershipRedFlag))
    }

    pub fn is_red_flag(&self) -> bool {
        self.findings.contains(&Finding::OwnershipRedFlag)
    }
}

/// Outcome of reviewing one state's facility list.
#[derive(Debug, Clone, Serialize)]
pub struct ToolkitReport<'a> {
    pub reviewed: usize,
    pub missing_staffing_data: usize,
    pub staffing_noncompliant: usize,
    pub red_flags: usize,
    /// Flagged facilities, highest composite score first.
    pub flagged: Vec<FlaggedFacility<'a>>,
}

/// Reviews facilities against the staffing thresholds and the ownership
/// red-flag rule.
pub fn review_state<'a>(facilities: impl IntoIterator<Item = &'a Facility>) -> ToolkitReport<'a> {
    let mut report = ToolkitReport {
        reviewed: 0,
        missing_staffing_data: 0,
        staffing_noncompliant: 0,
        red_flags: 0,
        flagged: Vec::new(),
    };

    for facility in facilities {
        report.reviewed += 1;
        if facility.total_hprd <= 0.0 {
            report.missing_staffing_data += 1;
        }

        let mut findings = staffing_findings(facility);
        if !findings.is_empty() {
            report.staffing_noncompliant += 1;
        }
        if is_ownership_red_flag(facility) {
            report.red_flags += 1;
            findings.push(Finding::OwnershipRedFlag);
        }
        if !findings.is_empty() {
            report.flagged.push(FlaggedFacility { facility, findings });
        }
    }

    report.flagged.sort_by(|a, b| {
        b.facility
            .composite
            .total_cmp(&a.facility.composite)
            .then_with(|| a.facility.ccn.cmp(&b.facility.ccn))
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staffed(total: f64, rn: f64, cna: f64) -> Facility {
        Facility {
            ccn: "365001".to_string(),
            total_hprd: total,
            rn_hprd: rn,
            cna_hprd: cna,
            ..Default::default()
        }
    }

    fn for_profit_chain(portfolio: u32) -> Facility {
        Facility {
            ccn: "365002".to_string(),
            ownership_type: "For profit - Corporation".to_string(),
            portfolio_size: portfolio,
            total_hprd: 4.0,
            rn_hprd: 0.8,
            cna_hprd: 2.6,
            ..Default::default()
        }
    }

    #[test]
    fn test_total_threshold_is_strict() {
        assert!(staffing_findings(&staffed(3.48, 0.6, 2.5)).is_empty());
        assert_eq!(
            staffing_findings(&staffed(3.479999, 0.6, 2.5)),
            vec![Finding::TotalStaffing { hprd: 3.479999 }]
        );
    }

    #[test]
    fn test_rn_and_cna_thresholds_are_strict() {
        assert!(staffing_findings(&staffed(4.0, 0.55, 2.45)).is_empty());
        assert_eq!(staffing_findings(&staffed(4.0, 0.54, 2.44)).len(), 2);
    }

    #[test]
    fn test_unreported_staffing_is_not_flagged() {
        assert!(staffing_findings(&staffed(0.0, 0.0, 0.0)).is_empty());
        assert!(!is_understaffed(&staffed(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_red_flag_requires_portfolio_and_issue() {
        let clean = for_profit_chain(9);
        assert!(!is_ownership_red_flag(&clean));

        let mut jeopardy = for_profit_chain(5);
        jeopardy.jeopardy_citations = 1;
        assert!(is_ownership_red_flag(&jeopardy));

        let mut small = for_profit_chain(4);
        small.jeopardy_citations = 1;
        assert!(!is_ownership_red_flag(&small));
    }

    #[test]
    fn test_red_flag_fines_threshold_is_strict() {
        let mut fined = for_profit_chain(6);
        fined.total_fines = 50_000.0;
        assert!(!is_ownership_red_flag(&fined));
        fined.total_fines = 50_000.01;
        assert!(is_ownership_red_flag(&fined));
    }

    #[test]
    fn test_red_flag_on_understaffing() {
        let mut thin = for_profit_chain(12);
        thin.total_hprd = 3.0;
        assert!(is_ownership_red_flag(&thin));
    }

    #[test]
    fn test_non_profit_is_never_red_flagged() {
        let mut facility = for_profit_chain(20);
        facility.ownership_type = "Non profit - Corporation".to_string();
        facility.jeopardy_citations = 4;
        assert!(!is_ownership_red_flag(&facility));
    }

    #[test]
    fn test_review_counts_and_order() {
        let mut low = staffed(3.0, 0.6, 2.5);
        low.ccn = "1".to_string();
        low.composite = 30.0;

        let mut worse = for_profit_chain(8);
        worse.ccn = "2".to_string();
        worse.composite = 70.0;
        worse.total_hprd = 3.2;

        let mut fine = staffed(4.0, 0.7, 2.6);
        fine.ccn = "3".to_string();

        let missing = staffed(0.0, 0.0, 0.0);

        let facilities = vec![low, worse, fine, missing];
        let report = review_state(&facilities);

        assert_eq!(report.reviewed, 4);
        assert_eq!(report.missing_staffing_data, 1);
        assert_eq!(report.staffing_noncompliant, 2);
        assert_eq!(report.red_flags, 1);
        assert_eq!(report.flagged.len(), 2);
        assert_eq!(report.flagged[0].facility.ccn, "2");
        assert!(report.flagged[0].is_red_flag());
        assert!(report.flagged[0].is_staffing_noncompliant());
        assert!(!report.flagged[1].is_red_flag());
    }
}
