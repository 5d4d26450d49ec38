//! Facilities a user has chosen to follow.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::infra::store::{KeyValueStore, load_json, save_json};

/// Store key holding the watchlist document.
pub const WATCHLIST_KEY: &str = "nursing-home-watchlist";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Facility CCN.
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

/// The single watchlist, backed by a [`KeyValueStore`].
///
/// Every operation reads the stored list fresh, so handles sharing one store
/// always agree.
pub struct Watchlist<S> {
    store: S,
}

impl<S: KeyValueStore> Watchlist<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored entries in insertion order, one per CCN.
    pub fn entries(&self) -> Vec<WatchEntry> {
        let mut entries: Vec<WatchEntry> = load_json(&self.store, WATCHLIST_KEY);
        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.id.clone()));
        entries
    }

    pub fn contains(&self, ccn: &str) -> bool {
        let ccn = ccn.trim();
        self.entries().iter().any(|e| e.id == ccn)
    }

    /// Adds `ccn` stamped with the current time. Returns `false` when it was
    /// already present, leaving the existing entry untouched.
    pub fn add(&self, ccn: &str) -> Result<bool> {
        self.add_at(ccn, Utc::now())
    }

    pub fn add_at(&self, ccn: &str, timestamp: DateTime<Utc>) -> Result<bool> {
        let ccn = ccn.trim();
        if ccn.is_empty() {
            bail!("cannot watch a facility without a CCN");
        }

        let mut entries = self.entries();
        if entries.iter().any(|e| e.id == ccn) {
            return Ok(false);
        }
        entries.push(WatchEntry {
            id: ccn.to_string(),
            timestamp,
        });
        save_json(&self.store, WATCHLIST_KEY, &entries)?;
        info!(ccn, total = entries.len(), "Facility added to watchlist");
        Ok(true)
    }

    /// Removes `ccn`. Returns `false` (and writes nothing) when it was not
    /// on the list.
    pub fn remove(&self, ccn: &str) -> Result<bool> {
        let ccn = ccn.trim();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|e| e.id != ccn);
        if entries.len() == before {
            return Ok(false);
        }
        save_json(&self.store, WATCHLIST_KEY, &entries)?;
        info!(ccn, total = entries.len(), "Facility removed from watchlist");
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(WATCHLIST_KEY)
    }
}
