//! USGS NWIS instantaneous-values adapter.
//!
//! Highest-priority live source: real-time sensor readings from USGS gauges.
//! API: https://waterservices.usgs.gov/nwis/iv/ (JSON format). The response
//! is a list of time series, one per (site, parameter code); we keep the
//! latest value per canonical key.

use crate::adapters::{is_later_iso, lenient_f64, BoundingBox, SourceAdapter};
use crate::error::Result;
use crate::model::ParameterReading;
use crate::params;
use crate::registry::RegionMeta;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://waterservices.usgs.gov";

pub const SOURCE_ID: &str = "usgs-nwis";

pub struct UsgsAdapter {
    client: reqwest::Client,
    base_url: String,
    search_radius_miles: f64,
}

#[derive(Debug, Deserialize)]
struct NwisResponse {
    value: NwisValue,
}

#[derive(Debug, Deserialize)]
struct NwisValue {
    #[serde(rename = "timeSeries", default)]
    time_series: Vec<NwisTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct NwisTimeSeries {
    #[serde(rename = "sourceInfo")]
    source_info: NwisSourceInfo,
    variable: NwisVariable,
    #[serde(default)]
    values: Vec<NwisValues>,
}

#[derive(Debug, Deserialize)]
struct NwisSourceInfo {
    #[serde(rename = "siteName", default)]
    site_name: String,
}

#[derive(Debug, Deserialize)]
struct NwisVariable {
    #[serde(rename = "variableCode", default)]
    variable_code: Vec<NwisVariableCode>,
    #[serde(default)]
    unit: NwisUnit,
}

#[derive(Debug, Deserialize)]
struct NwisVariableCode {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize, Default)]
struct NwisUnit {
    #[serde(rename = "unitCode", default)]
    unit_code: String,
}

#[derive(Debug, Deserialize)]
struct NwisValues {
    #[serde(default)]
    value: Vec<NwisPoint>,
}

#[derive(Debug, Deserialize)]
struct NwisPoint {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(rename = "dateTime", default)]
    date_time: String,
}

impl UsgsAdapter {
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

    fn build_url(&self, meta: &RegionMeta, codes: &str) -> String {
        match &meta.usgs_site {
            Some(site) => format!(
                "{}/nwis/iv/?format=json&sites={}&parameterCd={}&siteStatus=active",
                self.base_url, site, codes
            ),
            None => {
                let bbox =
                    BoundingBox::around(meta.latitude, meta.longitude, self.search_radius_miles);
                format!(
                    "{}/nwis/iv/?format=json&bBox={:.4},{:.4},{:.4},{:.4}&parameterCd={}&siteStatus=active",
                    self.base_url, bbox.west, bbox.south, bbox.east, bbox.north, codes
                )
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for UsgsAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &[
            params::keys::DO,
            params::keys::TEMPERATURE,
            params::keys::PH,
            params::keys::TURBIDITY,
            params::keys::CONDUCTIVITY,
            params::keys::DISCHARGE,
            params::keys::GAGE_HEIGHT,
            params::keys::SALINITY,
        ]
    }

    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>> {
        // Only request codes for parameters still unfilled
        let codes: Vec<&str> = params::USGS_CODES
            .iter()
            .copied()
            .filter(|code| {
                params::from_usgs_code(code)
                    .map(|key| missing.contains(key))
                    .unwrap_or(false)
            })
            .collect();
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.build_url(meta, &codes.join(","));
        debug!("USGS NWIS query: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let body: NwisResponse = response.json().await?;

        // Latest point per canonical key, lexicographically latest ISO wins
        let mut latest: HashMap<&'static str, ParameterReading> = HashMap::new();
        for series in &body.value.time_series {
            let Some(code) = series.variable.variable_code.first() else {
                continue;
            };
            let Some(key) = params::from_usgs_code(&code.value) else {
                continue;
            };
            if !missing.contains(key) {
                continue;
            }
            for block in &series.values {
                for point in &block.value {
                    let Some(value) = lenient_f64(&point.value) else {
                        continue;
                    };
                    let newer = latest
                        .get(key)
                        .map(|r| is_later_iso(r.sampled_at.as_deref(), &point.date_time))
                        .unwrap_or(true);
                    if newer {
                        latest.insert(
                            key,
                            ParameterReading {
                                key: key.to_string(),
                                value,
                                unit: series.variable.unit.unit_code.clone(),
                                source: SOURCE_ID.to_string(),
                                station: series.source_info.site_name.clone(),
                                sampled_at: Some(point.date_time.clone()),
                                provider_name: code.value.clone(),
                            },
                        );
                    }
                }
            }
        }

        Ok(latest.into_values().collect())
    }
}
