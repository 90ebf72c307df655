//! Region registry: resolves an opaque region id to coordinates, watershed
//! code, and per-provider station identifiers.
//!
//! Two tables back the registry. A small hand-curated table is compiled in
//! and is the single source of truth for the regions we actively support;
//! other modules should resolve regions from here rather than hardcoding
//! site codes. A larger auto-discovered table is fetched once per process
//! from a configured endpoint and cached in memory. Hand-curated entries
//! always win on id collision.

use crate::config::RegistryConfig;
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Immutable reference data for one monitoring region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionMeta {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// 8-digit hydrologic unit (watershed) code.
    pub huc8: String,
    /// Two-letter state code.
    pub state: String,
    #[serde(default)]
    pub usgs_site: Option<String>,
    #[serde(default)]
    pub wqp_site: Option<String>,
    #[serde(default)]
    pub ceden_station: Option<String>,
}

/// Upstream provider, for station-id resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    UsgsNwis,
    WqpPortal,
    Ceden,
}

struct RegionSeed {
    id: &'static str,
    name: &'static str,
    latitude: f64,
    longitude: f64,
    huc8: &'static str,
    state: &'static str,
    usgs_site: Option<&'static str>,
    wqp_site: Option<&'static str>,
    ceden_station: Option<&'static str>,
}

/// Hand-curated regions, ordered roughly east to west.
///
/// Sources:
///   - Site codes: USGS NWIS (waterservices.usgs.gov)
///   - HUC8 codes: USGS Watershed Boundary Dataset
static CURATED_REGIONS: &[RegionSeed] = &[
    RegionSeed {
        id: "baltimore-harbor",
        name: "Baltimore Inner Harbor",
        latitude: 39.263,
        longitude: -76.623,
        huc8: "02060003",
        state: "MD",
        usgs_site: Some("01589485"),
        wqp_site: Some("USGS-01589485"),
        ceden_station: None,
    },
    RegionSeed {
        id: "anacostia-river",
        name: "Anacostia River",
        latitude: 38.872,
        longitude: -76.966,
        huc8: "02070010",
        state: "DC",
        usgs_site: Some("01649500"),
        wqp_site: Some("USGS-01649500"),
        ceden_station: None,
    },
    RegionSeed {
        id: "hudson-albany",
        name: "Hudson River at Albany",
        latitude: 42.642,
        longitude: -73.747,
        huc8: "02020006",
        state: "NY",
        usgs_site: Some("01359139"),
        wqp_site: None,
        ceden_station: None,
    },
    RegionSeed {
        id: "schuylkill-philadelphia",
        name: "Schuylkill River at Philadelphia",
        latitude: 39.968,
        longitude: -75.189,
        huc8: "02040203",
        state: "PA",
        usgs_site: Some("01474500"),
        wqp_site: Some("USGS-01474500"),
        ceden_station: None,
    },
    RegionSeed {
        id: "sf-bay-alameda",
        name: "San Francisco Bay at Alameda",
        latitude: 37.772,
        longitude: -122.298,
        huc8: "18050004",
        state: "CA",
        usgs_site: Some("374938122251801"),
        wqp_site: None,
        ceden_station: Some("204ALA100"),
    },
    RegionSeed {
        id: "sacramento-freeport",
        name: "Sacramento River at Freeport",
        latitude: 38.456,
        longitude: -121.500,
        huc8: "18020163",
        state: "CA",
        usgs_site: Some("11447650"),
        wqp_site: Some("USGS-11447650"),
        ceden_station: Some("510SACC3A"),
    },
];

impl RegionMeta {
    fn from_seed(seed: &RegionSeed) -> Self {
        Self {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            latitude: seed.latitude,
            longitude: seed.longitude,
            huc8: seed.huc8.to_string(),
            state: seed.state.to_string(),
            usgs_site: seed.usgs_site.map(str::to_string),
            wqp_site: seed.wqp_site.map(str::to_string),
            ceden_station: seed.ceden_station.map(str::to_string),
        }
    }

    pub fn station_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::UsgsNwis => self.usgs_site.as_deref(),
            Provider::WqpPortal => self.wqp_site.as_deref(),
            Provider::Ceden => self.ceden_station.as_deref(),
        }
    }
}

/// Process-scoped registry component. Constructed once at startup and
/// injected into the cascade; no ambient global state.
pub struct RegionRegistry {
    client: reqwest::Client,
    discovery_url: Option<String>,
    discovered: RwLock<HashMap<String, RegionMeta>>,
    discovery_started: AtomicBool,
}

impl RegionRegistry {
    pub fn new(config: &RegistryConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            discovery_url: config.discovery_url.clone(),
            discovered: RwLock::new(HashMap::new()),
            discovery_started: AtomicBool::new(false),
        }
    }

    /// Resolve a region id. Hand-curated entries take precedence over
    /// auto-discovered entries sharing the same id.
    pub fn resolve(&self, region_id: &str) -> Option<RegionMeta> {
        if let Some(seed) = CURATED_REGIONS.iter().find(|s| s.id == region_id) {
            return Some(RegionMeta::from_seed(seed));
        }
        self.discovered
            .read()
            .ok()
            .and_then(|map| map.get(region_id).cloned())
    }

    /// Resolve a provider-specific station id, same precedence rule.
    pub fn station_id(&self, provider: Provider, region_id: &str) -> Option<String> {
        self.resolve(region_id)
            .and_then(|meta| meta.station_for(provider).map(str::to_string))
    }

    /// Kick off the one-time background fetch of the discovered table.
    /// Callers degrade gracefully to hand-curated-only until it lands.
    pub fn ensure_discovery_started(self: &Arc<Self>) {
        if self.discovery_url.is_none() {
            return;
        }
        if self.discovery_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            match registry.load_discovered().await {
                Ok(count) => info!("Discovered region table loaded: {} regions", count),
                Err(e) => warn!("Discovered region table fetch failed: {}", e),
            }
        });
    }

    /// Fetch and install the discovered table. Public so the binary can warm
    /// it eagerly and tests can drive it against a mock server.
    pub async fn load_discovered(&self) -> Result<usize> {
        let url = self
            .discovery_url
            .as_deref()
            .ok_or_else(|| EngineError::Config("no registry.discovery_url configured".into()))?;

        debug!("Fetching discovered region table from {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::InvalidData(format!(
                "discovery endpoint returned HTTP {}",
                response.status()
            )));
        }

        let regions: Vec<RegionMeta> = response.json().await?;
        let count = regions.len();
        self.install_discovered(regions);
        Ok(count)
    }

    /// Replace the discovered table wholesale.
    pub fn install_discovered(&self, regions: Vec<RegionMeta>) {
        let map: HashMap<String, RegionMeta> =
            regions.into_iter().map(|r| (r.id.clone(), r)).collect();
        if let Ok(mut guard) = self.discovered.write() {
            *guard = map;
        }
    }

    /// Number of curated regions compiled in. Used for startup logging.
    pub fn curated_count(&self) -> usize {
        CURATED_REGIONS.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RegionRegistry {
        RegionRegistry::new(&RegistryConfig::default(), reqwest::Client::new())
    }

    fn discovered_region(id: &str, name: &str) -> RegionMeta {
        RegionMeta {
            id: id.to_string(),
            name: name.to_string(),
            latitude: 40.0,
            longitude: -80.0,
            huc8: "00000000".to_string(),
            state: "XX".to_string(),
            usgs_site: Some("99999999".to_string()),
            wqp_site: None,
            ceden_station: None,
        }
    }

    #[test]
    fn test_resolves_curated_region() {
        let reg = registry();
        let meta = reg.resolve("baltimore-harbor").unwrap();
        assert_eq!(meta.state, "MD");
        assert!((meta.latitude - 39.263).abs() < 1e-9);
        assert_eq!(meta.usgs_site.as_deref(), Some("01589485"));
    }

    #[test]
    fn test_unknown_region_is_none() {
        assert!(registry().resolve("atlantis").is_none());
    }

    #[test]
    fn test_curated_wins_over_discovered() {
        let reg = registry();
        reg.install_discovered(vec![discovered_region("baltimore-harbor", "Wrong Name")]);
        let meta = reg.resolve("baltimore-harbor").unwrap();
        assert_eq!(meta.name, "Baltimore Inner Harbor");
    }

    #[test]
    fn test_discovered_fills_gaps() {
        let reg = registry();
        assert!(reg.resolve("lake-erie-cleveland").is_none());
        reg.install_discovered(vec![discovered_region("lake-erie-cleveland", "Lake Erie")]);
        let meta = reg.resolve("lake-erie-cleveland").unwrap();
        assert_eq!(meta.name, "Lake Erie");
    }

    #[test]
    fn test_station_id_per_provider() {
        let reg = registry();
        assert_eq!(
            reg.station_id(Provider::UsgsNwis, "baltimore-harbor").as_deref(),
            Some("01589485")
        );
        assert_eq!(reg.station_id(Provider::Ceden, "baltimore-harbor"), None);
        assert_eq!(
            reg.station_id(Provider::Ceden, "sf-bay-alameda").as_deref(),
            Some("204ALA100")
        );
    }
}
