//! Periodic out-of-band rebuild job for the gauge cache.

use crate::adapters::nwps::NwpsClient;
use crate::config::SchedulerConfig;
use crate::gauge_cache::GaugeCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

/// How long one full gauge sweep may take before the fetch is abandoned.
const REBUILD_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

pub struct RebuildScheduler {
    config: SchedulerConfig,
    nwps: NwpsClient,
    cache: Arc<GaugeCache>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RebuildScheduler {
    pub fn new(
        config: SchedulerConfig,
        nwps: NwpsClient,
        cache: Arc<GaugeCache>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            nwps,
            cache,
            shutdown_rx,
        }
    }

    pub async fn run(&mut self) {
        let initial_delay = Duration::from_secs(self.config.initial_delay_seconds);
        let poll_interval = Duration::from_secs(self.config.rebuild_interval_minutes * 60);

        info!(
            "Rebuild scheduler starting with {}s initial delay, {}m interval",
            self.config.initial_delay_seconds, self.config.rebuild_interval_minutes
        );

        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {},
            _ = self.shutdown_rx.changed() => {
                info!("Shutdown received during initial delay");
                return;
            }
        }

        // Run immediately, then on interval
        self.run_rebuild().await;

        let mut ticker = interval(poll_interval);
        ticker.tick().await; // First tick is immediate, skip it

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_rebuild().await;
                }
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping rebuild scheduler");
                    break;
                }
            }
        }
    }

    async fn run_rebuild(&self) {
        if !self.cache.try_begin_build() {
            warn!("Skipping rebuild cycle: another build is in progress");
            return;
        }

        info!("Starting gauge cache rebuild");
        match self.nwps.fetch_gauges(REBUILD_FETCH_TIMEOUT).await {
            Ok(gauges) => {
                let meta = self.cache.rebuild(gauges).await;
                info!(
                    "Rebuild complete: {} gauges, {} cells, built {}",
                    meta.gauge_count, meta.grid_cells, meta.built
                );
            }
            Err(e) => {
                // Previous structure keeps serving; next cycle retries
                error!("Gauge fetch failed, cache left unchanged: {}", e);
            }
        }
        self.cache.finish_build();
    }
}
