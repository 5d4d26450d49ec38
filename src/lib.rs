pub mod analyzers;
pub mod compliance;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod filter;
pub mod infra;
pub mod leads;
pub mod output;
pub mod report;
pub mod search;
pub mod tier;
pub mod watchlist;
