//! Water Quality Portal adapter.
//!
//! National portal of discrete samples (USGS + EPA STORET + STEWARDS).
//! Slower and less fresh than NWIS, so it sits a tier below it. Records are
//! loosely typed JSON objects keyed by WQP column names; we keep the latest
//! sample per characteristic.

use crate::adapters::{is_later_iso, lenient_f64, SourceAdapter};
use crate::error::Result;
use crate::model::ParameterReading;
use crate::params;
use crate::registry::RegionMeta;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://www.waterqualitydata.us";

pub const SOURCE_ID: &str = "wqp-portal";

pub struct WqpAdapter {
    client: reqwest::Client,
    base_url: String,
    search_radius_miles: f64,
}

impl WqpAdapter {
    pub fn new(client: reqwest::Client, search_radius_miles: f64) -> Self {
        Self::with_base_url(client, search_radius_miles, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        search_radius_miles: f64,
        base_url: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            search_radius_miles,
        }
    }

    fn build_url(&self, meta: &RegionMeta, characteristics: &str) -> String {
        let encoded = urlencode(characteristics);
        match &meta.wqp_site {
            Some(site) => format!(
                "{}/data/Result/search?siteid={}&characteristicName={}&mimeType=json&sorted=no&zip=no",
                self.base_url, site, encoded
            ),
            None => format!(
                "{}/data/Result/search?lat={:.4}&long={:.4}&within={:.1}&characteristicName={}&mimeType=json&sorted=no&zip=no",
                self.base_url, meta.latitude, meta.longitude, self.search_radius_miles, encoded
            ),
        }
    }
}

/// Minimal percent-encoding for the characteristicName query value.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' | ';' => out.push(ch),
            ' ' => out.push_str("%20"),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

#[async_trait]
impl SourceAdapter for WqpAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &[
            params::keys::DO,
            params::keys::TEMPERATURE,
            params::keys::PH,
            params::keys::TURBIDITY,
            params::keys::TSS,
            params::keys::TN,
            params::keys::TP,
            params::keys::BACTERIA,
            params::keys::CHLOROPHYLL,
            params::keys::CONDUCTIVITY,
            params::keys::SALINITY,
            params::keys::SECCHI,
        ]
    }

    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>> {
        // Only ask for characteristics that normalize to still-missing keys
        let wanted: Vec<&str> = params::WQP_CHARACTERISTICS
            .iter()
            .copied()
            .filter(|name| {
                params::from_wqp_characteristic(name)
                    .map(|key| missing.contains(key))
                    .unwrap_or(false)
            })
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.build_url(meta, &wanted.join(";"));
        debug!("WQP query: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let records: Vec<serde_json::Value> = response.json().await?;

        let mut latest: HashMap<&'static str, ParameterReading> = HashMap::new();
        for record in &records {
            let Some(characteristic) = record.get("CharacteristicName").and_then(|v| v.as_str())
            else {
                continue;
            };
            let Some(key) = params::from_wqp_characteristic(characteristic) else {
                continue;
            };
            if !missing.contains(key) {
                continue;
            }
            let Some(value) = record.get("ResultMeasureValue").and_then(lenient_f64) else {
                continue;
            };
            let date = record
                .get("ActivityStartDate")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let newer = latest
                .get(key)
                .map(|r| is_later_iso(r.sampled_at.as_deref(), date))
                .unwrap_or(true);
            if !newer {
                continue;
            }
            let unit = record
                .get("ResultMeasure/MeasureUnitCode")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let station = record
                .get("MonitoringLocationName")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            latest.insert(
                key,
                ParameterReading {
                    key: key.to_string(),
                    value,
                    unit,
                    source: SOURCE_ID.to_string(),
                    station,
                    sampled_at: (!date.is_empty()).then(|| date.to_string()),
                    provider_name: characteristic.to_string(),
                },
            );
        }

        Ok(latest.into_values().collect())
    }
}
