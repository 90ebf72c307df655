//! Core data types shared by the cascade and the gauge cache.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One observed value for one canonical parameter. Created by an adapter
/// when it successfully parses a provider record; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterReading {
    /// Canonical parameter key (see `params::keys`) or a `_`-prefixed aux key.
    pub key: String,
    pub value: f64,
    pub unit: String,
    /// Source identifier of the contributing adapter (e.g. "usgs-nwis").
    pub source: String,
    /// Station name as reported by the provider.
    pub station: String,
    /// ISO 8601 sample timestamp, if the provider supplied one.
    pub sampled_at: Option<String>,
    /// The provider's original field/code name, kept for attribution display.
    pub provider_name: String,
}

/// Age bracket of a source's most recent sample, for attribution display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Sampled within the last two days.
    Fresh,
    /// Sampled within the last thirty days.
    Recent,
    /// Older than thirty days.
    Stale,
    /// No timestamp, or one that does not parse.
    Unknown,
}

impl Freshness {
    /// Grade a sample timestamp against `now`. Accepts full RFC 3339 stamps
    /// and bare `YYYY-MM-DD` dates, the two forms providers actually send.
    pub fn grade(sampled_at: Option<&str>, now: DateTime<Utc>) -> Self {
        let Some(raw) = sampled_at else {
            return Freshness::Unknown;
        };
        let parsed = DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|n| n.and_utc())
            });
        let Some(ts) = parsed else {
            return Freshness::Unknown;
        };
        let age = now.signed_duration_since(ts);
        if age.num_hours() <= 48 {
            Freshness::Fresh
        } else if age.num_days() <= 30 {
            Freshness::Recent
        } else {
            Freshness::Stale
        }
    }
}

/// Per-source attribution row in a merged result.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDetail {
    pub source: String,
    pub count: usize,
    pub station: String,
    pub last_sampled: Option<String>,
    pub freshness: Freshness,
}

/// Merged best-effort snapshot for one region.
///
/// Invariants: a canonical key appears at most once, and its value comes from
/// the highest-priority source that reported it. `sources` is ordered by
/// first contribution; the first entry is the primary source.
#[derive(Debug, Clone, Default)]
pub struct WaterDataResult {
    pub readings: HashMap<String, ParameterReading>,
    pub sources: Vec<String>,
    pub station: Option<String>,
    pub sampled_at: Option<String>,
    pub details: Vec<SourceDetail>,
    /// At least one parameter came from any source, including the static
    /// reference table.
    pub has_real_data: bool,
    /// At least one parameter came from a live (non-reference) source.
    pub has_live_data: bool,
}

impl WaterDataResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Gap-fill insert: a reading lands only if its key is not already
    /// present. Returns whether the reading was inserted. This is the core
    /// merge invariant; earlier-priority sources are authoritative.
    pub fn try_insert(&mut self, reading: ParameterReading) -> bool {
        if self.readings.contains_key(&reading.key) {
            return false;
        }
        self.readings.insert(reading.key.clone(), reading);
        true
    }

    /// Record that `source` contributed `inserted` readings this round.
    /// First-seen order determines the primary source; station and timestamp
    /// are inherited from the first contributor.
    pub fn note_contribution(
        &mut self,
        source: &str,
        inserted: usize,
        station: &str,
        last_sampled: Option<String>,
    ) {
        if inserted == 0 {
            return;
        }
        if !self.sources.iter().any(|s| s == source) {
            self.sources.push(source.to_string());
        }
        if self.station.is_none() && !station.is_empty() {
            self.station = Some(station.to_string());
        }
        if self.sampled_at.is_none() {
            self.sampled_at = last_sampled.clone();
        }
        let freshness = Freshness::grade(last_sampled.as_deref(), Utc::now());
        self.details.push(SourceDetail {
            source: source.to_string(),
            count: inserted,
            station: station.to_string(),
            last_sampled,
            freshness,
        });
    }

    /// Primary source: first contributor, if any.
    pub fn primary_source(&self) -> Option<&str> {
        self.sources.first().map(String::as_str)
    }
}

/// NWS flood category for a gauge. Unknown upstream values deserialize as
/// `NotDefined` rather than failing the whole gauge list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FloodStatus {
    NoFlooding,
    Minor,
    Moderate,
    Major,
    #[default]
    #[serde(other)]
    NotDefined,
}

/// Observed or forecast value at a gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub value: f64,
    pub unit: String,
}

/// A spatial point entity from the NWPS gauge network. Created by the
/// periodic rebuild job; read-only to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NwpsGauge {
    pub location_id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub county: String,
    pub latitude: f64,
    pub longitude: f64,
    /// NWS weather forecast office responsible for this gauge.
    #[serde(default)]
    pub forecast_office: String,
    #[serde(default)]
    pub flood_status: FloodStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<GaugeReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<GaugeReading>,
}

/// Bucket of gauges sharing a quantized grid key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub gauges: Vec<NwpsGauge>,
}

/// Build metadata persisted alongside the grid. Field names are the durable
/// on-disk/blob contract and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    /// ISO 8601 build timestamp.
    pub built: String,
    pub gauge_count: usize,
    pub grid_cells: usize,
}

/// Entire spatial cache structure. Built atomically by the rebuild job and
/// replaced wholesale; never mutated incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NwpsCacheData {
    pub meta: CacheMeta,
    pub grid: HashMap<String, GridCell>,
}
