//! Cascade orchestrator: priority-ordered fan-out over source adapters with
//! gap-fill merging.
//!
//! Adapters are grouped into priority tiers. Tiers run sequentially because
//! a later tier must see the filled-key set produced by earlier tiers to
//! know whether it is needed at all; adapters inside one tier run
//! concurrently and are merged in tier position order, so completion order
//! never changes the outcome. Any adapter failure or timeout is a zero
//! contribution, never an aborted request.

use crate::adapters::SourceAdapter;
use crate::config::FetchConfig;
use crate::model::WaterDataResult;
use crate::params::{self, aux_keys};
use crate::reference::{self, REFERENCE_SOURCE};
use crate::registry::RegionRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Cascade {
    registry: Arc<RegionRegistry>,
    tiers: Vec<Vec<Arc<dyn SourceAdapter>>>,
    adapter_timeout: Duration,
}

/// Build the standard adapter tiers in trust/freshness order:
/// live sensors, then discrete-sample networks, then state portals and
/// compliance enrichments.
pub fn default_tiers(
    client: &reqwest::Client,
    fetch: &FetchConfig,
) -> Vec<Vec<Arc<dyn SourceAdapter>>> {
    use crate::adapters::{
        ceden::CedenAdapter, echo::EchoAdapter, socrata::SocrataAdapter, usgs::UsgsAdapter,
        wqp::WqpAdapter,
    };
    vec![
        vec![Arc::new(UsgsAdapter::new(
            client.clone(),
            fetch.search_radius_miles,
        )) as Arc<dyn SourceAdapter>],
        vec![
            Arc::new(WqpAdapter::new(client.clone(), fetch.search_radius_miles)),
            Arc::new(CedenAdapter::new(client.clone())),
        ],
        vec![
            Arc::new(SocrataAdapter::new(
                client.clone(),
                fetch.search_radius_miles,
            )),
            Arc::new(EchoAdapter::new(client.clone())),
        ],
    ]
}

/// Every key the cascade tries to satisfy: the canonical set plus the
/// reserved enrichment keys.
fn target_keys() -> HashSet<String> {
    params::ALL_CANONICAL
        .iter()
        .map(|k| k.to_string())
        .chain([
            aux_keys::VIOLATIONS.to_string(),
            aux_keys::TOXICITY_SAMPLES.to_string(),
        ])
        .collect()
}

impl Cascade {
    pub fn new(
        registry: Arc<RegionRegistry>,
        tiers: Vec<Vec<Arc<dyn SourceAdapter>>>,
        fetch: &FetchConfig,
    ) -> Self {
        Self {
            registry,
            tiers,
            adapter_timeout: Duration::from_secs(fetch.adapter_timeout_seconds),
        }
    }

    /// Assemble the best-effort snapshot for one region.
    ///
    /// Terminal states: `has_real_data` (anything at all), `has_live_data`
    /// (anything from a non-reference source), or fully empty; the caller
    /// should then fall back to clearly-labeled modeled data.
    pub async fn aggregate(&self, region_id: &str) -> WaterDataResult {
        self.registry.ensure_discovery_started();

        let Some(meta) = self.registry.resolve(region_id) else {
            info!("No data source configured for region '{}'", region_id);
            return WaterDataResult::empty();
        };

        let mut result = WaterDataResult::empty();
        let mut filled: HashSet<String> = HashSet::new();
        let targets = target_keys();

        for (tier_index, tier) in self.tiers.iter().enumerate() {
            let missing: HashSet<String> = targets.difference(&filled).cloned().collect();
            if missing.is_empty() {
                debug!("All parameters filled before tier {}", tier_index);
                break;
            }

            // Select runnable adapters, preserving tier position order
            let runnable: Vec<&Arc<dyn SourceAdapter>> = tier
                .iter()
                .filter(|adapter| {
                    if !adapter.wants(&meta) {
                        debug!(
                            "Skipping {} for '{}': prerequisites unavailable",
                            adapter.source_id(),
                            region_id
                        );
                        return false;
                    }
                    let relevant = adapter
                        .provided_keys()
                        .iter()
                        .any(|key| missing.contains(*key));
                    if !relevant {
                        debug!(
                            "Skipping {}: all of its parameters already filled",
                            adapter.source_id()
                        );
                    }
                    relevant
                })
                .collect();
            if runnable.is_empty() {
                continue;
            }

            // Fan out concurrently; join_all preserves input order so the
            // merge below is deterministic regardless of completion order.
            let calls = runnable.iter().map(|adapter| {
                tokio::time::timeout(
                    self.adapter_timeout,
                    adapter.fetch(&meta, &missing, self.adapter_timeout),
                )
            });
            let outcomes = futures::future::join_all(calls).await;

            for (adapter, outcome) in runnable.iter().zip(outcomes) {
                let readings = match outcome {
                    Err(_) => {
                        warn!(
                            "{} timed out after {:?} for '{}'",
                            adapter.source_id(),
                            self.adapter_timeout,
                            region_id
                        );
                        continue;
                    }
                    Ok(Err(e)) => {
                        warn!("{} failed for '{}': {}", adapter.source_id(), region_id, e);
                        continue;
                    }
                    Ok(Ok(readings)) => readings,
                };

                let mut inserted = 0;
                let mut station = String::new();
                let mut last_sampled: Option<String> = None;
                for reading in readings {
                    if filled.contains(&reading.key) {
                        continue;
                    }
                    filled.insert(reading.key.clone());
                    if station.is_empty() {
                        station = reading.station.clone();
                    }
                    if let Some(ts) = &reading.sampled_at {
                        if last_sampled.as_deref().map(|cur| ts.as_str() > cur).unwrap_or(true) {
                            last_sampled = Some(ts.clone());
                        }
                    }
                    result.try_insert(reading);
                    inserted += 1;
                }
                if inserted > 0 {
                    debug!(
                        "{} contributed {} parameter(s) for '{}'",
                        adapter.source_id(),
                        inserted,
                        region_id
                    );
                }
                result.note_contribution(adapter.source_id(), inserted, &station, last_sampled);
            }
        }

        // Reference fallback: last-known agency values, gap-only, tagged as
        // a distinct lowest-priority source
        let mut ref_inserted = 0;
        let mut ref_station = String::new();
        let mut ref_sampled: Option<String> = None;
        for reading in reference::readings_for(region_id) {
            if filled.contains(&reading.key) {
                continue;
            }
            filled.insert(reading.key.clone());
            if ref_station.is_empty() {
                ref_station = reading.station.clone();
            }
            if ref_sampled.is_none() {
                ref_sampled = reading.sampled_at.clone();
            }
            result.try_insert(reading);
            ref_inserted += 1;
        }
        result.note_contribution(REFERENCE_SOURCE, ref_inserted, &ref_station, ref_sampled);

        // Terminal-state flags count canonical parameters only; a result
        // holding nothing but aux enrichments is still "no data" to callers
        result.has_real_data = result.readings.keys().any(|k| !params::is_aux_key(k));
        result.has_live_data = result
            .readings
            .iter()
            .any(|(key, r)| !params::is_aux_key(key) && r.source != REFERENCE_SOURCE);

        if !result.has_real_data {
            info!("No data from any source for '{}'", region_id);
        }

        result
    }
}
