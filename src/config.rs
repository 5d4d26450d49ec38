//! Runtime configuration read from the environment (and `.env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_DATA_PATH: &str = "data/facilities.json";
pub const DEFAULT_STATE_DIR: &str = ".carewatch";
pub const DEFAULT_LOG_FILE: &str = "logs/carewatch.log";
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Dataset location: a local path (optionally gzipped) or an http(s) URL.
    pub data_source: String,
    /// Directory holding the watchlist and lead documents.
    pub state_dir: PathBuf,
    pub lead_webhook: Option<String>,
    /// Sent as a bearer token with webhook requests when set.
    pub lead_webhook_token: Option<String>,
    pub search_debounce: Duration,
    pub log_file: PathBuf,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let debounce_ms = match get("CAREWATCH_DEBOUNCE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("CAREWATCH_DEBOUNCE_MS must be milliseconds, got '{raw}'"))?,
            None => DEFAULT_DEBOUNCE_MS,
        };

        Ok(Self {
            data_source: get("CAREWATCH_DATA").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
            state_dir: get("CAREWATCH_STATE_DIR")
                .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
                .into(),
            lead_webhook: get("CAREWATCH_LEAD_WEBHOOK"),
            lead_webhook_token: get("CAREWATCH_LEAD_WEBHOOK_TOKEN"),
            search_debounce: Duration::from_millis(debounce_ms),
            log_file: get("LOG_FILE_PATH")
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
                .into(),
        })
    }
}
