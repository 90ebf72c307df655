//! NWPS (National Water Prediction Service) gauge client.
//!
//! Not part of the cascade: the periodic rebuild job uses this client to
//! pull the full flood-gauge list that backs the spatial grid cache.
//! API: https://api.water.noaa.gov/nwps/v1/gauges

use crate::error::Result;
use crate::model::{FloodStatus, GaugeReading, NwpsGauge};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.water.noaa.gov/nwps/v1";

pub struct NwpsClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GaugeListResponse {
    #[serde(default)]
    gauges: Vec<RawGauge>,
}

#[derive(Debug, Deserialize)]
struct RawGauge {
    #[serde(default)]
    lid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: StateField,
    #[serde(default)]
    county: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    wfo: String,
    #[serde(default)]
    status: Option<RawStatus>,
}

/// The upstream API has served the state both as a bare string and as an
/// object with an abbreviation; accept either.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum StateField {
    Plain(String),
    Object {
        #[serde(default)]
        abbreviation: String,
    },
    #[default]
    Missing,
}

impl StateField {
    fn abbreviation(&self) -> &str {
        match self {
            StateField::Plain(s) => s,
            StateField::Object { abbreviation } => abbreviation,
            StateField::Missing => "",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    observed: Option<RawReading>,
    #[serde(default)]
    forecast: Option<RawReading>,
}

#[derive(Debug, Deserialize)]
struct RawReading {
    primary: Option<f64>,
    #[serde(rename = "primaryUnit", default)]
    primary_unit: String,
    #[serde(rename = "floodCategory", default)]
    flood_category: String,
}

fn parse_flood_category(category: &str) -> FloodStatus {
    match category {
        "no_flooding" => FloodStatus::NoFlooding,
        "minor" | "action" => FloodStatus::Minor,
        "moderate" => FloodStatus::Moderate,
        "major" => FloodStatus::Major,
        _ => FloodStatus::NotDefined,
    }
}

fn to_reading(raw: &RawReading) -> Option<GaugeReading> {
    raw.primary.filter(|v| v.is_finite()).map(|value| GaugeReading {
        value,
        unit: raw.primary_unit.clone(),
    })
}

impl NwpsClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the full gauge list. Gauges missing coordinates are dropped;
    /// they cannot be spatially indexed.
    pub async fn fetch_gauges(&self, deadline: Duration) -> Result<Vec<NwpsGauge>> {
        let url = format!("{}/gauges", self.base_url);
        debug!("Fetching NWPS gauge list from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await?
            .error_for_status()?;
        let body: GaugeListResponse = response.json().await?;

        let total = body.gauges.len();
        let gauges: Vec<NwpsGauge> = body
            .gauges
            .into_iter()
            .filter_map(|raw| {
                let latitude = raw.latitude?;
                let longitude = raw.longitude?;
                if !latitude.is_finite() || !longitude.is_finite() {
                    return None;
                }
                let status = raw.status.as_ref();
                let flood_status = status
                    .and_then(|s| s.observed.as_ref())
                    .or_else(|| status.and_then(|s| s.forecast.as_ref()))
                    .map(|r| parse_flood_category(&r.flood_category))
                    .unwrap_or_default();
                Some(NwpsGauge {
                    location_id: raw.lid,
                    name: raw.name,
                    state: raw.state.abbreviation().to_string(),
                    county: raw.county,
                    latitude,
                    longitude,
                    forecast_office: raw.wfo,
                    flood_status,
                    observed: status.and_then(|s| s.observed.as_ref()).and_then(to_reading),
                    forecast: status.and_then(|s| s.forecast.as_ref()).and_then(to_reading),
                })
            })
            .collect();

        info!(
            "NWPS gauge list: {} usable of {} returned",
            gauges.len(),
            total
        );
        Ok(gauges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_gauge_with_object_state() {
        let body = r#"{"gauges": [{
            "lid": "BLTM2",
            "name": "Patapsco River at Baltimore",
            "state": {"abbreviation": "MD", "name": "Maryland"},
            "county": "Baltimore",
            "latitude": 39.26,
            "longitude": -76.62,
            "wfo": "LWX",
            "status": {
                "observed": {"primary": 3.4, "primaryUnit": "ft", "floodCategory": "no_flooding"},
                "forecast": {"primary": 4.1, "primaryUnit": "ft", "floodCategory": "minor"}
            }
        }]}"#;
        let parsed: GaugeListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.gauges.len(), 1);
        assert_eq!(parsed.gauges[0].state.abbreviation(), "MD");
    }

    #[test]
    fn test_flood_category_mapping() {
        assert_eq!(parse_flood_category("no_flooding"), FloodStatus::NoFlooding);
        assert_eq!(parse_flood_category("action"), FloodStatus::Minor);
        assert_eq!(parse_flood_category("major"), FloodStatus::Major);
        assert_eq!(parse_flood_category("mystery"), FloodStatus::NotDefined);
        assert_eq!(parse_flood_category(""), FloodStatus::NotDefined);
    }

    #[test]
    fn test_gauge_without_coordinates_is_unusable() {
        let body = r#"{"gauges": [{"lid": "X", "name": "No Coords", "state": "TX"}]}"#;
        let parsed: GaugeListResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.gauges[0].latitude.is_none());
    }
}
