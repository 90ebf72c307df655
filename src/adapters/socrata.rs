//! Generic Socrata state open-data adapter.
//!
//! Several states (NY, NJ, PA, VA) publish water-quality samples through
//! Socrata portals with near-identical query semantics but their own column
//! names. One handler covers them all; per-state resources are looked up by
//! the region's state code. Queries are scoped to the region's bounding box
//! and ordered newest-first, so the fetched window holds the latest samples
//! near the region rather than an arbitrary slice of the state. Rows are
//! loosely typed, so field access is candidate-list based.

use crate::adapters::{is_later_iso, lenient_f64, BoundingBox, SourceAdapter};
use crate::error::Result;
use crate::model::ParameterReading;
use crate::params;
use crate::registry::RegionMeta;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

pub const SOURCE_ID: &str = "state-socrata";

/// One state's Socrata dataset: its endpoint plus the column names needed to
/// build a geographically scoped, date-ordered query.
#[derive(Debug, Clone)]
pub struct SocrataResource {
    pub url: String,
    pub date_field: String,
    pub latitude_field: String,
    pub longitude_field: String,
}

const DEFAULT_RESOURCES: &[(&str, &str, &str, &str, &str)] = &[
    (
        "NY",
        "https://data.ny.gov/resource/4k4g-s9hz.json",
        "sample_date",
        "latitude",
        "longitude",
    ),
    (
        "NJ",
        "https://data.nj.gov/resource/6khm-yny7.json",
        "sample_date",
        "latitude",
        "longitude",
    ),
    (
        "PA",
        "https://data.pa.gov/resource/3brs-52mh.json",
        "sample_date",
        "latitude",
        "longitude",
    ),
    (
        "VA",
        "https://data.virginia.gov/resource/7rig-bfxy.json",
        "sample_date",
        "latitude",
        "longitude",
    ),
];

const NAME_FIELDS: &[&str] = &["characteristic_name", "parameter", "analyte"];
const VALUE_FIELDS: &[&str] = &["result_value", "value", "result"];
const UNIT_FIELDS: &[&str] = &["unit", "result_unit", "units"];
const DATE_FIELDS: &[&str] = &["sample_date", "activity_start_date", "date"];
const STATION_FIELDS: &[&str] = &["station_name", "site_name", "station"];

pub struct SocrataAdapter {
    client: reqwest::Client,
    resources: HashMap<String, SocrataResource>,
    search_radius_miles: f64,
}

impl SocrataAdapter {
    pub fn new(client: reqwest::Client, search_radius_miles: f64) -> Self {
        let resources = DEFAULT_RESOURCES
            .iter()
            .map(|(state, url, date, lat, lng)| {
                (
                    state.to_string(),
                    SocrataResource {
                        url: url.to_string(),
                        date_field: date.to_string(),
                        latitude_field: lat.to_string(),
                        longitude_field: lng.to_string(),
                    },
                )
            })
            .collect();
        Self {
            client,
            resources,
            search_radius_miles,
        }
    }

    /// Replace the resource table, for tests or non-default portals.
    pub fn with_resources(
        client: reqwest::Client,
        resources: HashMap<String, SocrataResource>,
        search_radius_miles: f64,
    ) -> Self {
        Self {
            client,
            resources,
            search_radius_miles,
        }
    }

    /// SoQL query scoped to the region's bounding box, newest samples first.
    fn query_params(
        &self,
        resource: &SocrataResource,
        meta: &RegionMeta,
    ) -> [(&'static str, String); 3] {
        let bbox = BoundingBox::around(meta.latitude, meta.longitude, self.search_radius_miles);
        [
            ("$limit", "5000".to_string()),
            (
                "$where",
                format!(
                    "{} between {:.4} and {:.4} AND {} between {:.4} and {:.4}",
                    resource.latitude_field,
                    bbox.south,
                    bbox.north,
                    resource.longitude_field,
                    bbox.west,
                    bbox.east
                ),
            ),
            ("$order", format!("{} DESC", resource.date_field)),
        ]
    }

    fn field<'a>(row: &'a serde_json::Value, candidates: &[&str]) -> Option<&'a serde_json::Value> {
        candidates.iter().find_map(|name| row.get(*name))
    }
}

#[async_trait]
impl SourceAdapter for SocrataAdapter {
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
        ]
    }

    fn wants(&self, meta: &RegionMeta) -> bool {
        self.resources.contains_key(&meta.state)
    }

    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>> {
        let Some(resource) = self.resources.get(&meta.state) else {
            return Ok(Vec::new());
        };
        debug!("Socrata query for {} near {}", meta.state, meta.id);

        let response = self
            .client
            .get(&resource.url)
            .query(&self.query_params(resource, meta))
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let rows: Vec<serde_json::Value> = response.json().await?;

        let mut latest: HashMap<&'static str, ParameterReading> = HashMap::new();
        for row in &rows {
            let Some(name) = Self::field(row, NAME_FIELDS).and_then(|v| v.as_str()) else {
                continue;
            };
            // State portals reuse the WQP characteristic vocabulary
            let Some(key) = params::from_wqp_characteristic(name) else {
                continue;
            };
            if !missing.contains(key) {
                continue;
            }
            let Some(value) = Self::field(row, VALUE_FIELDS).and_then(lenient_f64) else {
                continue;
            };
            let date = Self::field(row, DATE_FIELDS)
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
                    unit: Self::field(row, UNIT_FIELDS)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    source: SOURCE_ID.to_string(),
                    station: Self::field(row, STATION_FIELDS)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    sampled_at: (!date.is_empty()).then(|| date.to_string()),
                    provider_name: name.to_string(),
                },
            );
        }

        Ok(latest.into_values().collect())
    }
}
