use carewatch::analyzers::owners::{OwnerRanking, aggregate_owners, rank_owners};
use carewatch::analyzers::states::{aggregate_national, aggregate_states};
use carewatch::compliance::review_state;
use carewatch::dataset::Dataset;
use carewatch::filter::{self, FacilityFilter, Sort};
use carewatch::infra::store::FileStore;
use carewatch::output::write_facilities_csv;
use carewatch::report::build_report;
use carewatch::search;
use carewatch::tier::RiskTier;
use carewatch::watchlist::Watchlist;
use chrono::Utc;

fn load_fixture() -> Dataset {
    let bytes = include_bytes!("fixtures/facilities.json");
    Dataset::from_slice(bytes).expect("Failed to parse fixture dataset")
}

#[test]
fn test_full_pipeline() {
    let dataset = load_fixture();
    assert_eq!(dataset.len(), 5);

    let states = aggregate_states(&dataset);
    let codes: Vec<&str> = states.iter().map(|s| s.state.as_str()).collect();
    assert_eq!(codes, vec!["AL", "GA"]);

    let national = aggregate_national(&dataset);
    assert_eq!(national.facility_count, 5);
    assert_eq!(national.tiers.get(RiskTier::Critical), 1);
}

#[test]
fn test_owner_partition_matches_dataset_totals() {
    let dataset = load_fixture();
    let owners = aggregate_owners(dataset.facilities());

    let count: usize = owners.iter().map(|o| o.facility_count).sum();
    let fines: f64 = owners.iter().map(|o| o.total_fines).sum();
    let expected: f64 = dataset.facilities().map(|f| f.total_fines).sum();
    assert_eq!(count, dataset.len());
    assert!((fines - expected).abs() < 1e-6);

    let ranked = rank_owners(owners, OwnerRanking::Fines, 2, 5);
    assert_eq!(ranked[0].owner, "Acme Holdings, LLC");
    assert_eq!(ranked[0].states, vec!["AL".to_string(), "GA".to_string()]);
}

#[test]
fn test_toolkit_threshold_edges() {
    let dataset = load_fixture();
    let report = review_state(dataset.state("GA").unwrap());

    assert_eq!(report.reviewed, 2);
    assert_eq!(report.flagged.len(), 1);
    assert_eq!(report.flagged[0].facility.ccn, "115001");
    assert!(report.flagged[0].is_red_flag());
}

#[test]
fn test_filtered_view_exports_to_csv() {
    let dataset = load_fixture();
    let filter = FacilityFilter {
        state: Some("AL".to_string()),
        min_tier: Some(RiskTier::High),
        ..Default::default()
    };
    let rows = filter::apply(dataset.facilities(), &filter, Sort::default(), None);

    let mut buffer = Vec::new();
    write_facilities_csv(&mut buffer, rows.iter().copied()).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("\"015010\",\"Coosa Valley Health Center\""));
    assert!(lines[1].ends_with("\"Acme Holdings, LLC\""));
    assert!(lines[2].starts_with("\"015009\",\"Burns Nursing Home, Inc.\""));
}

#[test]
fn test_search_and_report() {
    let dataset = load_fixture();
    let hits = search::search(dataset.facilities(), "acme", 10);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].ccn, "015010");

    let report = build_report("AL", dataset.state("AL").unwrap(), Utc::now());
    assert!(report.contains("Coosa Valley Health Center"));
}

#[test]
fn test_watchlist_persists_across_handles() {
    let dir = std::env::temp_dir().join("carewatch_integration_watchlist");
    let _ = std::fs::remove_dir_all(&dir);

    let first = Watchlist::new(FileStore::new(&dir));
    assert!(first.add("015009").unwrap());
    assert!(!first.add("015009").unwrap());

    let second = Watchlist::new(FileStore::new(&dir));
    assert_eq!(second.entries().len(), 1);
    assert!(!second.remove("999999").unwrap());
    assert!(second.remove("015009").unwrap());
    assert!(first.entries().is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}
