//! Source adapters: one per upstream provider.
//!
//! Each adapter queries one heterogeneous upstream API and emits zero or
//! more canonical `ParameterReading`s. Adapters are independent, swappable,
//! and individually fallible; a failure is logged by the cascade and treated
//! as zero contribution, never aborting the request.

use crate::error::Result;
use crate::model::ParameterReading;
use crate::registry::RegionMeta;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

pub mod ceden;
pub mod echo;
pub mod nwps;
pub mod socrata;
pub mod usgs;
pub mod wqp;

/// Contract every provider adapter implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source identifier (e.g. "usgs-nwis") used for attribution.
    fn source_id(&self) -> &'static str;

    /// Keys this adapter can possibly provide. The cascade skips an adapter
    /// when none of these are still missing.
    fn provided_keys(&self) -> &'static [&'static str];

    /// Prerequisite check: whether the region carries the identifiers or
    /// coordinates this adapter needs. Skipped adapters cost nothing.
    fn wants(&self, meta: &RegionMeta) -> bool {
        let _ = meta;
        true
    }

    /// Query the provider for the still-missing keys. The deadline is a hard
    /// bound for the whole call; implementations also apply it to their own
    /// HTTP request so a stalled connection cannot outlive it.
    async fn fetch(
        &self,
        meta: &RegionMeta,
        missing: &HashSet<String>,
        deadline: Duration,
    ) -> Result<Vec<ParameterReading>>;
}

/// Shared HTTP client for all adapters.
pub fn http_client(user_agent: &str) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

/// Lenient numeric extraction: providers send numbers, numeric strings,
/// nulls, and the occasional sentinel. Anything non-finite is dropped.
pub(crate) fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Whether `candidate` is strictly later than `current`. ISO 8601 strings
/// order lexicographically, which is the tie-break rule for time series.
pub(crate) fn is_later_iso(current: Option<&str>, candidate: &str) -> bool {
    match current {
        Some(existing) => candidate > existing,
        None => true,
    }
}

/// Geographic bounding box for coordinate + radius queries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn around(latitude: f64, longitude: f64, radius_miles: f64) -> Self {
        // 1 degree latitude ~ 69 miles; longitude degrees shrink with cos(lat)
        let lat_offset = radius_miles / 69.0;
        let lng_offset = radius_miles / (69.0 * latitude.to_radians().cos().max(0.01));
        Self {
            west: longitude - lng_offset,
            south: latitude - lat_offset,
            east: longitude + lng_offset,
            north: latitude + lat_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_f64_accepts_numbers_and_strings() {
        assert_eq!(lenient_f64(&json!(7.2)), Some(7.2));
        assert_eq!(lenient_f64(&json!("5.8")), Some(5.8));
        assert_eq!(lenient_f64(&json!(" 3.1 ")), Some(3.1));
    }

    #[test]
    fn test_lenient_f64_drops_junk() {
        assert_eq!(lenient_f64(&json!(null)), None);
        assert_eq!(lenient_f64(&json!("n/a")), None);
        assert_eq!(lenient_f64(&json!({"v": 1})), None);
        assert_eq!(lenient_f64(&json!("NaN")), None);
    }

    #[test]
    fn test_iso_tie_break_is_lexicographic() {
        assert!(is_later_iso(None, "2025-01-01T00:00:00Z"));
        assert!(is_later_iso(
            Some("2025-01-01T00:00:00Z"),
            "2025-01-02T00:00:00Z"
        ));
        assert!(!is_later_iso(
            Some("2025-01-02T00:00:00Z"),
            "2025-01-01T00:00:00Z"
        ));
    }

    #[test]
    fn test_bounding_box_contains_center() {
        let bbox = BoundingBox::around(39.263, -76.623, 10.0);
        assert!(bbox.south < 39.263 && 39.263 < bbox.north);
        assert!(bbox.west < -76.623 && -76.623 < bbox.east);
    }
}
