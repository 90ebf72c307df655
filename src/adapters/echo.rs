//! EPA ECHO adapter: Clean Water Act facilities in violation.
//!
//! Pure enrichment: it never produces canonical water-quality keys, only
//! the `_violations` count, so UI layers can show compliance context next to
//! the measured parameters.

use crate::adapters::SourceAdapter;
use crate::error::Result;
use crate::model::ParameterReading;
use crate::params::aux_keys;
use crate::registry::RegionMeta;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://echodata.epa.gov";

pub const SOURCE_ID: &str = "epa-echo";

pub struct EchoAdapter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EchoResponse {
    #[serde(rename = "Results", default)]
    results: EchoResults,
}

#[derive(Debug, Deserialize, Default)]
struct EchoResults {
    #[serde(rename = "Facilities", default)]
    facilities: Vec<serde_json::Value>,
    #[serde(rename = "QueryRows", default)]
    query_rows: Option<String>,
}

impl EchoAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for EchoAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &[aux_keys::VIOLATIONS]
    }

    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>> {
        if !missing.contains(aux_keys::VIOLATIONS) {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/echo/cwa_rest_services.get_facilities?output=JSON&p_st={}&p_qiv=Y&responseset=10000",
            self.base_url, meta.state
        );
        debug!("ECHO violations query for {}", meta.state);

        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let body: EchoResponse = response.json().await?;

        // QueryRows is authoritative when present; the facility array caps out
        let count = body
            .results
            .query_rows
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(body.results.facilities.len() as f64);

        if count <= 0.0 {
            return Ok(Vec::new());
        }

        Ok(vec![ParameterReading {
            key: aux_keys::VIOLATIONS.to_string(),
            value: count,
            unit: "facilities".to_string(),
            source: SOURCE_ID.to_string(),
            station: format!("{} statewide", meta.state),
            sampled_at: None,
            provider_name: "cwa_facilities_in_violation".to_string(),
        }])
    }
}
