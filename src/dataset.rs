//! Facility records and the state-keyed dataset they are loaded from.
//!
//! The dataset is a single JSON object keyed by two-letter state code, each
//! value an array of facility records. Upstream exports are not always
//! complete or consistently typed, so numeric fields accept integers, floats
//! and numeric strings, and anything missing or unreadable reads as zero.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::fetch::{BasicClient, fetch_bytes};
use crate::tier::{RiskTier, tier};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// True for `http://` and `https://` sources; anything else is a file path.
pub fn is_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Numeric field types a dataset value can be coerced into.
trait Lenient: Default + Sized {
    fn from_f64(value: f64) -> Option<Self>;
}

impl Lenient for f64 {
    fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then_some(value)
    }
}

macro_rules! lenient_count {
    ($($t:ty),*) => {$(
        impl Lenient for $t {
            fn from_f64(value: f64) -> Option<Self> {
                let rounded = value.round();
                (rounded >= 0.0 && rounded <= <$t>::MAX as f64).then_some(rounded as $t)
            }
        }
    )*};
}

lenient_count!(u8, u32);

/// Reads an integer, float or numeric string. `null`, absence and blank
/// strings read as zero; any other value logs a warning and reads as zero.
fn lenient_number<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Lenient,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        None => return Ok(T::default()),
        Some(value) => value,
    };
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(T::default()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed.and_then(T::from_f64) {
        Some(n) => Ok(n),
        None => {
            warn!(%value, "Unreadable numeric field, reading as zero");
            Ok(T::default())
        }
    }
}

/// Reads a string, accepting bare numbers (CCNs are sometimes exported as
/// integers). `null` and absence read as empty.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(value) => {
            warn!(%value, "Unreadable text field, reading as empty");
            Ok(String::new())
        }
    }
}

/// A single nursing facility as published in the static dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facility {
    #[serde(deserialize_with = "lenient_text")]
    pub ccn: String,
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub city: String,
    #[serde(deserialize_with = "lenient_text")]
    pub state: String,

    /// Overall CMS star rating, 1-5. Zero means unrated.
    #[serde(deserialize_with = "lenient_number", alias = "overall_rating")]
    pub stars: u8,
    /// Composite risk score (0-100), computed upstream.
    #[serde(deserialize_with = "lenient_number", alias = "composite_score")]
    pub composite: f64,

    // staffing, hours per resident day
    #[serde(deserialize_with = "lenient_number")]
    pub total_hprd: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub rn_hprd: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub lpn_hprd: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub cna_hprd: f64,

    // penalties and inspections
    #[serde(deserialize_with = "lenient_number", alias = "fines_total")]
    pub total_fines: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub fine_count: u32,
    #[serde(deserialize_with = "lenient_number")]
    pub total_deficiencies: u32,
    #[serde(deserialize_with = "lenient_number", alias = "jeopardy_count")]
    pub jeopardy_citations: u32,

    // ownership
    #[serde(deserialize_with = "lenient_text", alias = "worst_owner")]
    pub owner_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub chain_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub ownership_type: String,
    #[serde(deserialize_with = "lenient_number", alias = "owner_portfolio_count")]
    pub portfolio_size: u32,

    #[serde(deserialize_with = "lenient_number")]
    pub beds: u32,
}

/// Coarse ownership category derived from the free-text CMS ownership type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipKind {
    ForProfit,
    NonProfit,
    Government,
    Unknown,
}

impl OwnershipKind {
    /// Classifies CMS ownership strings such as `"For profit - Corporation"`
    /// or `"Non profit - Church related"`.
    pub fn classify(ownership_type: &str) -> Self {
        let normalized = ownership_type.to_ascii_lowercase().replace('-', " ");
        if normalized.contains("non profit") || normalized.contains("nonprofit") {
            OwnershipKind::NonProfit
        } else if normalized.contains("for profit") {
            OwnershipKind::ForProfit
        } else if normalized.contains("government") {
            OwnershipKind::Government
        } else {
            OwnershipKind::Unknown
        }
    }
}

impl Facility {
    pub fn tier(&self) -> RiskTier {
        tier(self.composite)
    }

    pub fn ownership_kind(&self) -> OwnershipKind {
        OwnershipKind::classify(&self.ownership_type)
    }

    pub fn is_for_profit(&self) -> bool {
        self.ownership_kind() == OwnershipKind::ForProfit
    }

    pub fn is_rated(&self) -> bool {
        (1..=5).contains(&self.stars)
    }

    pub fn has_jeopardy(&self) -> bool {
        self.jeopardy_citations > 0
    }
}

/// All facilities, grouped by upper-case state code.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    states: BTreeMap<String, Vec<Facility>>,
}

impl Dataset {
    /// Builds a dataset from already-decoded state lists.
    ///
    /// State keys are upper-cased, facilities without a state inherit their
    /// key, and duplicate CCNs within one state keep the first record.
    pub fn from_states(raw: BTreeMap<String, Vec<Facility>>) -> Self {
        let mut states: BTreeMap<String, Vec<Facility>> = BTreeMap::new();

        for (code, facilities) in raw {
            let code = code.trim().to_ascii_uppercase();
            let list = states.entry(code.clone()).or_default();
            let mut seen: HashSet<String> = list.iter().map(|f| f.ccn.clone()).collect();

            for mut facility in facilities {
                if facility.state.trim().is_empty() {
                    facility.state = code.clone();
                }
                if !facility.ccn.is_empty() && !seen.insert(facility.ccn.clone()) {
                    warn!(state = %code, ccn = %facility.ccn, "Duplicate CCN dropped");
                    continue;
                }
                list.push(facility);
            }
        }

        Self { states }
    }

    /// Decodes a dataset from JSON bytes, gunzipping first when the bytes
    /// carry a gzip header.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: BTreeMap<String, Vec<Facility>> = if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut decoded)
                .context("failed to decompress dataset")?;
            serde_json::from_slice(&decoded)
        } else {
            serde_json::from_slice(bytes)
        }
        .context("dataset is not a JSON object of state facility lists")?;

        Ok(Self::from_states(raw))
    }

    /// Loads a dataset from a local path or an `http(s)` URL.
    #[tracing::instrument]
    pub async fn load(source: &str) -> Result<Self> {
        let bytes = if is_url(source) {
            let client = BasicClient::new();
            fetch_bytes(&client, source)
                .await
                .with_context(|| format!("failed to fetch dataset from {source}"))?
        } else {
            std::fs::read(source).with_context(|| format!("failed to read dataset {source}"))?
        };
        debug!(bytes = bytes.len(), "Dataset bytes received");

        let dataset = Self::from_slice(&bytes)?;
        info!(
            states = dataset.states.len(),
            facilities = dataset.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, &[Facility])> {
        self.states.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Facilities for one state; the code is matched case-insensitively.
    pub fn state(&self, code: &str) -> Option<&[Facility]> {
        self.states
            .get(&code.trim().to_ascii_uppercase())
            .map(Vec::as_slice)
    }

    /// Every facility, in state-code order.
    pub fn facilities(&self) -> impl Iterator<Item = &Facility> {
        self.states.values().flatten()
    }

    /// Facilities of one state, or all of them when `state` is `None`.
    pub fn scope<'a>(&'a self, state: Option<&str>) -> Box<dyn Iterator<Item = &'a Facility> + 'a> {
        match state {
            Some(code) => Box::new(self.state(code).unwrap_or_default().iter()),
            None => Box::new(self.facilities()),
        }
    }

    pub fn find(&self, ccn: &str) -> Option<&Facility> {
        let ccn = ccn.trim();
        self.facilities().find(|f| f.ccn == ccn)
    }

    pub fn len(&self) -> usize {
        self.states.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
