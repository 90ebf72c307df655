//! Spatially-indexed flood-gauge cache.
//!
//! Gauge coordinates are quantized into a fixed-resolution angular grid.
//! Lookups check the target cell plus its eight neighbors, because a point
//! near a cell boundary may have its nearest gauge registered next door.
//!
//! Lifecycle: cold (nothing loaded) -> warming (disk, then blob) -> warm
//! (serving from memory) -> periodically rebuilding (the writer replaces the
//! whole structure) -> warm again. Readers never block on the build lock;
//! they read whatever is currently installed.

use crate::blob::BlobStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::{CacheMeta, GridCell, NwpsCacheData, NwpsGauge};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Number of fractional digits a grid key carries for a given resolution.
fn decimals_for(resolution: f64) -> usize {
    format!("{}", resolution)
        .split('.')
        .nth(1)
        .map(|frac| frac.len().min(6))
        .unwrap_or(0)
}

fn quantize_axis(value: f64, resolution: f64) -> f64 {
    (value / resolution).floor() * resolution
}

/// Deterministic cell identifier for a coordinate, e.g. "39.2_-76.7" at
/// 0.1 degree resolution.
pub fn grid_key(latitude: f64, longitude: f64, resolution: f64) -> String {
    let decimals = decimals_for(resolution);
    format!(
        "{:.dec$}_{:.dec$}",
        quantize_axis(latitude, resolution),
        quantize_axis(longitude, resolution),
        dec = decimals
    )
}

/// The 3x3 block of cell keys centered on a coordinate's cell.
fn neighbor_keys(latitude: f64, longitude: f64, resolution: f64) -> Vec<String> {
    let decimals = decimals_for(resolution);
    let cell_lat = (latitude / resolution).floor();
    let cell_lng = (longitude / resolution).floor();
    let mut keys = Vec::with_capacity(9);
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            let glat = (cell_lat + dy as f64) * resolution;
            let glng = (cell_lng + dx as f64) * resolution;
            keys.push(format!("{:.dec$}_{:.dec$}", glat, glng, dec = decimals));
        }
    }
    keys
}

/// Process-wide rebuild lock with stale-lock recovery.
///
/// A crashed or hung builder cannot wedge the system: once the flag has been
/// held longer than the timeout it is auto-cleared on the next check. The
/// rare concurrent rebuild this allows is acceptable because rebuild is an
/// idempotent full replacement.
pub struct BuildLock {
    held_since: Mutex<Option<Instant>>,
    timeout: Duration,
}

impl BuildLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held_since: Mutex::new(None),
            timeout,
        }
    }

    /// Acquire the lock unless a fresh build is already in flight.
    pub fn try_begin(&self) -> bool {
        let Ok(mut guard) = self.held_since.lock() else {
            return false;
        };
        match *guard {
            Some(since) if since.elapsed() < self.timeout => false,
            Some(since) => {
                warn!(
                    "Build lock held for {:?} exceeds timeout {:?}; treating as stale",
                    since.elapsed(),
                    self.timeout
                );
                *guard = Some(Instant::now());
                true
            }
            None => {
                *guard = Some(Instant::now());
                true
            }
        }
    }

    pub fn finish(&self) {
        if let Ok(mut guard) = self.held_since.lock() {
            *guard = None;
        }
    }

    /// Whether a build is in progress. A stale flag reads as not-in-progress.
    pub fn is_build_in_progress(&self) -> bool {
        self.held_since
            .lock()
            .ok()
            .and_then(|guard| *guard)
            .map(|since| since.elapsed() < self.timeout)
            .unwrap_or(false)
    }
}

pub struct GaugeCache {
    resolution: f64,
    disk_path: PathBuf,
    blob: Option<BlobStore>,
    state: RwLock<Option<Arc<NwpsCacheData>>>,
    lock: BuildLock,
}

impl GaugeCache {
    pub fn new(config: &CacheConfig, blob: Option<BlobStore>) -> Self {
        Self {
            resolution: config.grid_resolution_degrees,
            disk_path: PathBuf::from(&config.disk_path),
            blob,
            state: RwLock::new(None),
            lock: BuildLock::new(Duration::from_secs(config.build_lock_timeout_minutes * 60)),
        }
    }

    /// Gauges in the cell containing the point plus its eight neighbors.
    /// `None` until the cache has warmed at least once.
    pub fn lookup(&self, latitude: f64, longitude: f64) -> Option<Vec<NwpsGauge>> {
        let guard = self.state.read().ok()?;
        let data = guard.as_ref()?;
        let mut found = Vec::new();
        for key in neighbor_keys(latitude, longitude, self.resolution) {
            if let Some(cell) = data.grid.get(&key) {
                found.extend(cell.gauges.iter().cloned());
            }
        }
        Some(found)
    }

    /// Build metadata of the currently served structure, if warm.
    pub fn meta(&self) -> Option<CacheMeta> {
        let guard = self.state.read().ok()?;
        guard.as_ref().map(|data| data.meta.clone())
    }

    pub fn is_warm(&self) -> bool {
        self.state
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub fn try_begin_build(&self) -> bool {
        self.lock.try_begin()
    }

    pub fn finish_build(&self) {
        self.lock.finish()
    }

    pub fn is_build_in_progress(&self) -> bool {
        self.lock.is_build_in_progress()
    }

    /// Cold-start load: disk first (fast, local), then blob (slower,
    /// authoritative across instances). First success wins. Returns whether
    /// the cache is warm afterwards.
    pub async fn warm(&self) -> bool {
        if self.is_warm() {
            return true;
        }

        match self.load_from_disk() {
            Ok(data) => {
                info!(
                    "Gauge cache warmed from disk: {} gauges in {} cells (built {})",
                    data.meta.gauge_count, data.meta.grid_cells, data.meta.built
                );
                self.install(data);
                return true;
            }
            Err(e) => debug!("Disk tier unavailable: {}", e),
        }

        if let Some(blob) = &self.blob {
            match blob.download().await {
                Ok(body) => match serde_json::from_str::<NwpsCacheData>(&body) {
                    Ok(data) => {
                        info!(
                            "Gauge cache warmed from blob: {} gauges in {} cells (built {})",
                            data.meta.gauge_count, data.meta.grid_cells, data.meta.built
                        );
                        self.install(data);
                        return true;
                    }
                    Err(e) => warn!("Blob tier held unparseable cache data: {}", e),
                },
                Err(e) => debug!("Blob tier unavailable: {}", e),
            }
        }

        info!("Gauge cache cold: no persistence tier available");
        false
    }

    /// Atomic full replacement of the served structure, then persistence:
    /// disk is best-effort, blob is awaited so a restarted instance can warm
    /// without waiting for the next scheduled rebuild.
    pub async fn rebuild(&self, gauges: Vec<NwpsGauge>) -> CacheMeta {
        let data = build_grid(gauges, self.resolution);
        let meta = data.meta.clone();
        let serialized = serde_json::to_string(&data);

        self.install(data);
        info!(
            "Gauge cache rebuilt: {} gauges across {} cells",
            meta.gauge_count, meta.grid_cells
        );

        match serialized {
            Ok(body) => {
                if let Err(e) = self.save_to_disk(&body) {
                    warn!("Disk persist failed (non-fatal): {}", e);
                }
                if let Some(blob) = &self.blob {
                    if let Err(e) = blob.upload(body).await {
                        warn!("Blob persist failed (non-fatal): {}", e);
                    }
                }
            }
            Err(e) => warn!("Cache serialization failed, persistence skipped: {}", e),
        }

        meta
    }

    fn install(&self, data: NwpsCacheData) {
        if let Ok(mut guard) = self.state.write() {
            *guard = Some(Arc::new(data));
        }
    }

    fn load_from_disk(&self) -> Result<NwpsCacheData> {
        let body = std::fs::read_to_string(&self.disk_path)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn save_to_disk(&self, body: &str) -> Result<()> {
        if let Some(parent) = self.disk_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.disk_path, body)?;
        Ok(())
    }
}

/// Bucket gauges into grid cells and stamp build metadata.
pub fn build_grid(gauges: Vec<NwpsGauge>, resolution: f64) -> NwpsCacheData {
    let gauge_count = gauges.len();
    let mut grid: HashMap<String, GridCell> = HashMap::new();
    for gauge in gauges {
        let key = grid_key(gauge.latitude, gauge.longitude, resolution);
        grid.entry(key).or_default().gauges.push(gauge);
    }
    let grid_cells = grid.len();
    NwpsCacheData {
        meta: CacheMeta {
            built: Utc::now().to_rfc3339(),
            gauge_count,
            grid_cells,
        },
        grid,
    }
}
