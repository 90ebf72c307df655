//! CEDEN adapter (California surface-water chemistry and toxicity).
//!
//! Curated citizen-science and agency monitoring network served through the
//! data.ca.gov CKAN datastore SQL API. Chemistry records normalize to
//! canonical keys; toxicity records contribute only the `_toxicity_samples`
//! enrichment count.

use crate::adapters::{is_later_iso, lenient_f64, SourceAdapter};
use crate::error::{EngineError, Result};
use crate::model::ParameterReading;
use crate::params::{self, aux_keys};
use crate::registry::RegionMeta;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://data.ca.gov/api/3/action/datastore_search_sql";

/// CKAN resource ids for the chemistry and toxicity datasets.
const CHEMISTRY_RESOURCE: &str = "97b8bb60-8e58-4c97-a07f-d51a48cd36d4";
const TOXICITY_RESOURCE: &str = "bd484e9b-426a-4ba6-ba4d-f5f8ce095836";

pub const SOURCE_ID: &str = "ceden";

pub struct CedenAdapter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CkanResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: CkanResult,
}

#[derive(Debug, Deserialize, Default)]
struct CkanResult {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

impl CedenAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    async fn ckan_sql(&self, sql: &str, deadline: Duration) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("sql", sql)])
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let body: CkanResponse = response.json().await?;
        if !body.success {
            return Err(EngineError::InvalidData("CKAN query failed".to_string()));
        }
        Ok(body.result.records)
    }
}

#[async_trait]
impl SourceAdapter for CedenAdapter {
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
            params::keys::COLIFORM_TOTAL,
            params::keys::CHLOROPHYLL,
            params::keys::CONDUCTIVITY,
            params::keys::SALINITY,
            aux_keys::TOXICITY_SAMPLES,
        ]
    }

    fn wants(&self, meta: &RegionMeta) -> bool {
        // CEDEN only covers California stations
        meta.ceden_station.is_some()
    }

    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>> {
        let Some(station) = meta.ceden_station.as_deref() else {
            return Ok(Vec::new());
        };
        let station_escaped = station.replace('\'', "''");

        let sql = format!(
            "SELECT \"StationName\",\"StationCode\",\"SampleDate\",\"Analyte\",\"Result\",\"Unit\" \
             FROM \"{}\" WHERE \"StationCode\" = '{}' \
             AND \"DataQuality\" NOT IN ('MetaData','Reject') \
             ORDER BY \"SampleDate\" DESC LIMIT 500",
            CHEMISTRY_RESOURCE, station_escaped
        );
        debug!("CEDEN chemistry query for station {}", station);
        let records = self.ckan_sql(&sql, deadline).await?;

        let mut latest: HashMap<&'static str, ParameterReading> = HashMap::new();
        for record in &records {
            let Some(analyte) = record.get("Analyte").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(key) = params::from_ceden_analyte(analyte) else {
                continue;
            };
            if !missing.contains(key) {
                continue;
            }
            let Some(value) = record.get("Result").and_then(lenient_f64) else {
                continue;
            };
            let date = record
                .get("SampleDate")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let newer = latest
                .get(key)
                .map(|r| is_later_iso(r.sampled_at.as_deref(), date))
                .unwrap_or(true);
            if !newer {
                continue;
            }
            latest.insert(
                key,
                ParameterReading {
                    key: key.to_string(),
                    value,
                    unit: record
                        .get("Unit")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    source: SOURCE_ID.to_string(),
                    station: record
                        .get("StationName")
                        .and_then(|v| v.as_str())
                        .unwrap_or(station)
                        .to_string(),
                    sampled_at: (!date.is_empty()).then(|| date.to_string()),
                    provider_name: analyte.to_string(),
                },
            );
        }
        let mut readings: Vec<ParameterReading> = latest.into_values().collect();

        // Toxicity enrichment: sample count under a reserved aux key
        if missing.contains(aux_keys::TOXICITY_SAMPLES) {
            let tox_sql = format!(
                "SELECT COUNT(*) AS \"n\" FROM \"{}\" WHERE \"StationCode\" = '{}' \
                 AND \"SampleDate\" >= '2022-01-01'",
                TOXICITY_RESOURCE, station_escaped
            );
            match self.ckan_sql(&tox_sql, deadline).await {
                Ok(rows) => {
                    let count = rows
                        .first()
                        .and_then(|r| r.get("n"))
                        .and_then(lenient_f64)
                        .unwrap_or(0.0);
                    if count > 0.0 {
                        readings.push(ParameterReading {
                            key: aux_keys::TOXICITY_SAMPLES.to_string(),
                            value: count,
                            unit: "samples".to_string(),
                            source: SOURCE_ID.to_string(),
                            station: station.to_string(),
                            sampled_at: None,
                            provider_name: "toxicity_sample_count".to_string(),
                        });
                    }
                }
                Err(e) => debug!("CEDEN toxicity count failed for {}: {}", station, e),
            }
        }

        Ok(readings)
    }
}
