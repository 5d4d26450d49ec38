//! Export formatting for facility views.
//!
//! Supports pretty JSON and fully quoted CSV for facility tables, toolkit
//! findings and owner leaderboards.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::OwnerAggregate;
use crate::compliance::FlaggedFacility;
use crate::dataset::Facility;

/// Serializes any view as pretty-printed JSON.
pub fn to_json_pretty(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

const FACILITY_HEADERS: [&str; 13] = [
    "CCN",
    "Name",
    "City",
    "State",
    "Stars",
    "Composite Score",
    "Risk Tier",
    "Total HPRD",
    "RN HPRD",
    "CNA HPRD",
    "Total Fines",
    "Jeopardy Citations",
    "Owner",
];

const FINDING_HEADERS: [&str; 10] = [
    "CCN",
    "Name",
    "City",
    "Composite Score",
    "Total HPRD",
    "RN HPRD",
    "CNA HPRD",
    "Owner",
    "Portfolio Size",
    "Findings",
];

const OWNER_HEADERS: [&str; 8] = [
    "Owner",
    "Facilities",
    "Avg Composite",
    "Avg Stars",
    "Total Fines",
    "Jeopardy Facilities",
    "Low-Star Facilities",
    "States",
];

// Field order must follow FACILITY_HEADERS.
#[derive(Serialize)]
struct FacilityRow<'a> {
    ccn: &'a str,
    name: &'a str,
    city: &'a str,
    state: &'a str,
    stars: String,
    composite: String,
    tier: &'static str,
    total_hprd: String,
    rn_hprd: String,
    cna_hprd: String,
    total_fines: String,
    jeopardy: u32,
    owner: &'a str,
}

#[derive(Serialize)]
struct FindingRow<'a> {
    ccn: &'a str,
    name: &'a str,
    city: &'a str,
    composite: String,
    total_hprd: String,
    rn_hprd: String,
    cna_hprd: String,
    owner: &'a str,
    portfolio_size: u32,
    findings: String,
}

#[derive(Serialize)]
struct OwnerRow<'a> {
    owner: &'a str,
    facilities: usize,
    avg_composite: String,
    avg_stars: String,
    total_fines: String,
    jeopardy: usize,
    low_star: usize,
    states: String,
}

/// Two decimal places, or empty when the metric was not reported.
fn reported(value: f64) -> String {
    if value > 0.0 {
        format!("{value:.2}")
    } else {
        String::new()
    }
}

fn dollars(value: f64) -> String {
    format!("{value:.0}")
}

impl<'a> From<&'a Facility> for FacilityRow<'a> {
    fn from(f: &'a Facility) -> Self {
        FacilityRow {
            ccn: &f.ccn,
            name: &f.name,
            city: &f.city,
            state: &f.state,
            stars: if f.is_rated() {
                f.stars.to_string()
            } else {
                String::new()
            },
            composite: format!("{:.2}", f.composite),
            tier: f.tier().label(),
            total_hprd: reported(f.total_hprd),
            rn_hprd: reported(f.rn_hprd),
            cna_hprd: reported(f.cna_hprd),
            total_fines: dollars(f.total_fines),
            jeopardy: f.jeopardy_citations,
            owner: &f.owner_name,
        }
    }
}

/// Writes `headers` first, so an empty view still yields a header line.
fn write_rows<W: Write, R: Serialize>(
    writer: W,
    headers: &[&str],
    rows: impl IntoIterator<Item = R>,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    writer.write_record(headers)?;

    let mut count = 0usize;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    debug!(rows = count, "CSV rows written");
    Ok(())
}

/// Writes a facility table with every field quoted.
pub fn write_facilities_csv<'a, W: Write>(
    writer: W,
    facilities: impl IntoIterator<Item = &'a Facility>,
) -> Result<()> {
    write_rows(
        writer,
        &FACILITY_HEADERS,
        facilities.into_iter().map(FacilityRow::from),
    )
}

/// Writes toolkit findings, one row per flagged facility.
pub fn write_findings_csv<W: Write>(writer: W, flagged: &[FlaggedFacility<'_>]) -> Result<()> {
    write_rows(
        writer,
        &FINDING_HEADERS,
        flagged.iter().map(|item| {
            let f = item.facility;
            FindingRow {
                ccn: &f.ccn,
                name: &f.name,
                city: &f.city,
                composite: format!("{:.2}", f.composite),
                total_hprd: reported(f.total_hprd),
                rn_hprd: reported(f.rn_hprd),
                cna_hprd: reported(f.cna_hprd),
                owner: &f.owner_name,
                portfolio_size: f.portfolio_size,
                findings: item
                    .findings
                    .iter()
                    .map(|finding| finding.describe())
                    .collect::<Vec<_>>()
                    .join("; "),
            }
        }),
    )
}

/// Writes an owner leaderboard.
pub fn write_owners_csv<W: Write>(writer: W, owners: &[OwnerAggregate]) -> Result<()> {
    write_rows(
        writer,
        &OWNER_HEADERS,
        owners.iter().map(|o| OwnerRow {
            owner: &o.owner,
            facilities: o.facility_count,
            avg_composite: format!("{:.2}", o.avg_composite),
            avg_stars: format!("{:.2}", o.avg_stars),
            total_fines: dollars(o.total_fines),
            jeopardy: o.jeopardy_facilities,
            low_star: o.low_star_facilities,
            states: o.states.join(" "),
        }),
    )
}

/// Creates (or truncates) `path` and hands it to `write`.
pub fn export_to_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write(file)?;
    info!(path = %path.display(), "Export written");
    Ok(())
}
