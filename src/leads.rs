//! Contact requests captured from report downloads.
//!
//! Submissions are always written to the local store first; the optional
//! webhook is a best-effort copy whose failures are only logged.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetch::{HttpClient, post_json};
use crate::infra::store::{KeyValueStore, load_json, save_json};

/// Store key holding every submission.
pub const LEADS_KEY: &str = "nursing-home-leads";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub facility_ccn: Option<String>,
    #[serde(default)]
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

impl Lead {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("name is required");
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => bail!("'{email}' is not an email address"),
        }
    }
}

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    StoredOnly,
    Forwarded,
    ForwardFailed,
}

pub struct LeadCapture<S, C> {
    store: S,
    webhook: Option<(C, String)>,
}

impl<S: KeyValueStore, C: HttpClient> LeadCapture<S, C> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            webhook: None,
        }
    }

    pub fn with_webhook(mut self, client: C, url: impl Into<String>) -> Self {
        self.webhook = Some((client, url.into()));
        self
    }

    pub fn submissions(&self) -> Vec<Lead> {
        load_json(&self.store, LEADS_KEY)
    }

    /// Validates and appends `lead` to the store, then forwards it to the
    /// webhook when one is configured.
    ///
    /// # Errors
    ///
    /// Fails on invalid input or when the local write fails. Webhook errors
    /// are reported through [`Delivery::ForwardFailed`] instead.
    #[tracing::instrument(skip_all, fields(email = %lead.email))]
    pub async fn submit(&self, lead: Lead) -> Result<Delivery> {
        lead.validate()?;

        let mut leads = self.submissions();
        leads.push(lead.clone());
        save_json(&self.store, LEADS_KEY, &leads)?;
        info!(total = leads.len(), "Lead stored");

        let Some((client, url)) = &self.webhook else {
            return Ok(Delivery::StoredOnly);
        };

        match post_json(client, url, &lead).await {
            Ok(status) => {
                info!(status, "Lead forwarded to webhook");
                Ok(Delivery::Forwarded)
            }
            Err(e) => {
                warn!(error = %e, "Webhook delivery failed; lead kept locally");
                Ok(Delivery::ForwardFailed)
            }
        }
    }
}
