//! CLI entry point for carewatch.
//!
//! Loads the state-keyed facility dataset and exposes the rollup,
//! leaderboard, filter, search, toolkit and report views, plus the local
//! watchlist and lead capture.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use carewatch::analyzers::owners::{OwnerRanking, aggregate_owners, rank_owners};
use carewatch::analyzers::states::{StateRanking, aggregate_national, aggregate_states, rank_states};
use carewatch::compliance::review_state;
use carewatch::config::Config;
use carewatch::dataset::{Dataset, OwnershipKind};
use carewatch::fetch::{ApiKey, BasicClient, HttpClient};
use carewatch::filter::{self, FacilityFilter, Sort, SortDirection, SortKey};
use carewatch::infra::store::FileStore;
use carewatch::leads::{Delivery, Lead, LeadCapture};
use carewatch::output::{
    export_to_file, to_json_pretty, write_facilities_csv, write_findings_csv, write_owners_csv,
};
use carewatch::report::build_report;
use carewatch::search;
use carewatch::tier::RiskTier;
use carewatch::watchlist::Watchlist;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "carewatch")]
#[command(about = "Explore CMS nursing home inspection, staffing and penalty data", long_about = None)]
struct Cli {
    /// Dataset path or URL (overrides CAREWATCH_DATA)
    #[arg(long, global = true, value_name = "FILE_OR_URL")]
    data: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank states by their facility rollups
    States {
        #[arg(short, long, value_enum, default_value_t = StateRanking::Composite)]
        by: StateRanking,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rank owners by the condition of their portfolios
    Owners {
        #[arg(short, long)]
        state: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OwnerRanking::LowStars)]
        by: OwnerRanking,

        /// Ignore owners with fewer facilities than this
        #[arg(long, default_value_t = 2)]
        min_facilities: usize,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Also write the leaderboard to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// List facilities matching a set of filters
    Facilities {
        #[arg(short, long)]
        state: Option<String>,

        #[arg(long, value_enum)]
        ownership: Option<OwnershipKind>,

        #[arg(long)]
        min_score: Option<f64>,

        #[arg(long)]
        max_score: Option<f64>,

        /// Only facilities at or above this risk tier
        #[arg(long, value_enum)]
        tier: Option<RiskTier>,

        #[arg(long)]
        max_stars: Option<u8>,

        /// Only facilities with immediate-jeopardy citations
        #[arg(long)]
        jeopardy: bool,

        /// Free-text match on name, city, owner or CCN
        #[arg(short, long)]
        query: Option<String>,

        #[arg(long, value_enum, default_value_t = SortKey::Composite)]
        sort: SortKey,

        #[arg(long, value_enum, default_value_t = SortDirection::Desc)]
        direction: SortDirection,

        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Write the result to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Search facilities by name, city, owner or CCN
    Search {
        /// Query text; omit with --interactive
        query: Option<String>,

        #[arg(short, long)]
        state: Option<String>,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Read queries from stdin, searching once typing settles
        #[arg(short, long)]
        interactive: bool,
    },
    /// Flag understaffed facilities and ownership red flags in a state
    Toolkit {
        #[arg(short, long)]
        state: String,

        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report for a state
    Report {
        #[arg(short, long)]
        state: String,

        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Manage the facility watchlist
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Record a contact request
    Lead {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        organization: String,

        #[arg(long, default_value = "")]
        role: String,

        /// CCN of the facility the request concerns
        #[arg(long)]
        facility: Option<String>,

        #[arg(long, default_value = "")]
        message: String,
    },
}

#[derive(Subcommand)]
enum WatchAction {
    /// Start watching a facility
    Add { ccn: String },
    /// Stop watching a facility
    Remove { ccn: String },
    /// Show watched facilities
    List,
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parsed before the environment so `--help` works with a broken .env.
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = config
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = config
        .log_file
        .file_name()
        .unwrap_or(OsStr::new("carewatch.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse::<Directive>()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse::<Directive>()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let source = cli.data.unwrap_or_else(|| config.data_source.clone());

    match cli.command {
        Commands::States { by, json } => {
            let dataset = Dataset::load(&source).await?;
            let ranked = rank_states(aggregate_states(&dataset), by);

            if json {
                println!("{}", to_json_pretty(&ranked)?);
                return Ok(());
            }

            let national = aggregate_national(&dataset);
            println!(
                "{:<5} {:>6} {:>7} {:>6} {:>6} {:>14} {:>9} {:>11}",
                "state", "count", "score", "stars", "hprd", "fines", "jeopardy", "for-profit"
            );
            for s in ranked.iter().chain(std::iter::once(&national)) {
                println!(
                    "{:<5} {:>6} {:>7.1} {:>6.2} {:>6.2} {:>14.0} {:>9} {:>10.0}%",
                    s.state,
                    s.facility_count,
                    s.avg_composite,
                    s.avg_stars,
                    s.avg_total_hprd,
                    s.total_fines,
                    s.jeopardy_facilities,
                    s.for_profit_share * 100.0
                );
            }
        }
        Commands::Owners {
            state,
            by,
            min_facilities,
            limit,
            csv,
            json,
        } => {
            let dataset = Dataset::load(&source).await?;
            let owners = rank_owners(
                aggregate_owners(dataset.scope(state.as_deref())),
                by,
                min_facilities,
                limit,
            );

            if let Some(path) = &csv {
                export_to_file(path, |file| write_owners_csv(file, &owners))?;
            }
            if json {
                println!("{}", to_json_pretty(&owners)?);
                return Ok(());
            }
            if owners.is_empty() {
                println!("No owners match these criteria.");
                return Ok(());
            }

            for (rank, owner) in owners.iter().enumerate() {
                println!(
                    "{:>3}. {} ({} facilities in {}) low-star {}, jeopardy {}, fines ${:.0}, avg score {:.1}, avg stars {:.1}",
                    rank + 1,
                    owner.owner,
                    owner.facility_count,
                    owner.states.join("/"),
                    owner.low_star_facilities,
                    owner.jeopardy_facilities,
                    owner.total_fines,
                    owner.avg_composite,
                    owner.avg_stars
                );
            }
        }
        Commands::Facilities {
            state,
            ownership,
            min_score,
            max_score,
            tier,
            max_stars,
            jeopardy,
            query,
            sort,
            direction,
            limit,
            csv,
            json,
        } => {
            let dataset = Dataset::load(&source).await?;
            let filter = FacilityFilter {
                state,
                ownership,
                min_score,
                max_score,
                min_tier: tier,
                max_stars,
                jeopardy_only: jeopardy,
                query,
            };
            let rows = filter::apply(
                dataset.facilities(),
                &filter,
                Sort {
                    key: sort,
                    direction,
                },
                limit,
            );
            info!(matched = rows.len(), "Facility filter applied");

            if let Some(path) = &csv {
                export_to_file(path, |file| {
                    write_facilities_csv(file, rows.iter().copied())
                })?;
            }
            if json {
                println!("{}", to_json_pretty(&rows)?);
                return Ok(());
            }

            for f in &rows {
                println!(
                    "{} {:<40} {:<18} {} score {:>5.1} [{}] stars {} fines ${:.0} jeopardy {}",
                    f.ccn, f.name, f.city, f.state, f.composite, f.tier(), f.stars, f.total_fines, f.jeopardy_citations
                );
            }
            println!("{} facilities", rows.len());
        }
        Commands::Search {
            query,
            state,
            limit,
            interactive,
        } => {
            let dataset = Dataset::load(&source).await?;

            if interactive {
                let (tx, rx) = mpsc::channel(64);
                tokio::spawn(async move {
                    let mut lines = BufReader::new(tokio::io::stdin()).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                });
                search::debounce(rx, config.search_debounce, |q: String| {
                    print_search(&dataset, state.as_deref(), &q, limit);
                })
                .await;
            } else {
                let Some(query) = query else {
                    bail!("a query is required unless --interactive is given");
                };
                print_search(&dataset, state.as_deref(), &query, limit);
            }
        }
        Commands::Toolkit { state, csv, json } => {
            let dataset = Dataset::load(&source).await?;
            let facilities = dataset
                .state(&state)
                .with_context(|| format!("no facilities found for state '{state}'"))?;
            let report = review_state(facilities);

            if let Some(path) = &csv {
                export_to_file(path, |file| write_findings_csv(file, &report.flagged))?;
            }
            if json {
                println!("{}", to_json_pretty(&report)?);
                return Ok(());
            }

            println!(
                "{} facilities reviewed: {} below a staffing minimum, {} ownership red flags, {} without staffing data",
                report.reviewed,
                report.staffing_noncompliant,
                report.red_flags,
                report.missing_staffing_data
            );
            for item in &report.flagged {
                let reasons: Vec<String> = item.findings.iter().map(|f| f.describe()).collect();
                println!(
                    "- {} {} ({}): {}",
                    item.facility.ccn,
                    item.facility.name,
                    item.facility.owner_name,
                    reasons.join("; ")
                );
            }
        }
        Commands::Report { state, out } => {
            let dataset = Dataset::load(&source).await?;
            let facilities = dataset
                .state(&state)
                .with_context(|| format!("no facilities found for state '{state}'"))?;
            let report = build_report(&state.to_ascii_uppercase(), facilities, Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { action } => {
            let watchlist = Watchlist::new(FileStore::new(&config.state_dir));

            match action {
                WatchAction::Add { ccn } => {
                    match Dataset::load(&source).await {
                        Ok(dataset) if dataset.find(&ccn).is_none() => {
                            bail!("no facility with CCN {ccn} in the dataset");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Dataset unavailable, adding CCN unchecked"),
                    }
                    if watchlist.add(&ccn)? {
                        println!("Watching {ccn}.");
                    } else {
                        println!("{ccn} is already on the watchlist.");
                    }
                }
                WatchAction::Remove { ccn } => {
                    if watchlist.remove(&ccn)? {
                        println!("Stopped watching {ccn}.");
                    } else {
                        println!("{ccn} was not on the watchlist.");
                    }
                }
                WatchAction::List => {
                    let entries = watchlist.entries();
                    if entries.is_empty() {
                        println!("Watchlist is empty.");
                        return Ok(());
                    }
                    let dataset = Dataset::load(&source)
                        .await
                        .inspect_err(|e| warn!(error = %e, "Dataset unavailable, listing CCNs only"))
                        .ok();
                    for entry in &entries {
                        let facility = dataset.as_ref().and_then(|d| d.find(&entry.id));
                        match facility {
                            Some(f) => println!(
                                "- {} {} ({}, {}) score {:.1} [{}], added {}",
                                f.ccn,
                                f.name,
                                f.city,
                                f.state,
                                f.composite,
                                f.tier(),
                                entry.timestamp.format("%Y-%m-%d")
                            ),
                            None => println!(
                                "- {} added {}",
                                entry.id,
                                entry.timestamp.format("%Y-%m-%d")
                            ),
                        }
                    }
                }
                WatchAction::Clear => {
                    watchlist.clear()?;
                    println!("Watchlist cleared.");
                }
            }
        }
        Commands::Lead {
            name,
            email,
            organization,
            role,
            facility,
            message,
        } => {
            let mut capture: LeadCapture<FileStore, Box<dyn HttpClient>> =
                LeadCapture::new(FileStore::new(&config.state_dir));
            if let Some(url) = &config.lead_webhook {
                let client: Box<dyn HttpClient> = match &config.lead_webhook_token {
                    Some(token) => Box::new(ApiKey::bearer(BasicClient::new(), token)?),
                    None => Box::new(BasicClient::new()),
                };
                capture = capture.with_webhook(client, url.clone());
            }

            let lead = Lead {
                name,
                email,
                organization,
                role,
                facility_ccn: facility,
                message,
                submitted_at: Utc::now(),
            };
            match capture.submit(lead).await? {
                Delivery::StoredOnly | Delivery::Forwarded => println!("Request recorded."),
                Delivery::ForwardFailed => {
                    println!("Request recorded locally; webhook delivery failed.")
                }
            }
        }
    }

    Ok(())
}

fn print_search(dataset: &Dataset, state: Option<&str>, query: &str, limit: usize) {
    let hits = search::search(dataset.scope(state), query, limit);
    if hits.is_empty() {
        println!("No facilities match '{}'.", query.trim());
        return;
    }
    for f in hits {
        println!(
            "{} {} ({}, {}) score {:.1} [{}] owner {}",
            f.ccn,
            f.name,
            f.city,
            f.state,
            f.composite,
            f.tier(),
            f.owner_name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_and_arguments_parse_without_environment() {
        let err = Cli::try_parse_from(["carewatch", "--help"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let cli = Cli::try_parse_from(["carewatch", "states", "--data", "http_export.json"]).unwrap();
        assert_eq!(cli.data.as_deref(), Some("http_export.json"));
        assert!(matches!(cli.command, Commands::States { json: false, .. }));
    }
}
