use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wq_engine::adapters::{self, nwps::NwpsClient};
use wq_engine::blob::BlobStore;
use wq_engine::config::Config;
use wq_engine::gauge_cache::GaugeCache;
use wq_engine::registry::RegionRegistry;
use wq_engine::scheduler::RebuildScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wq_engine=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Water quality reconciliation engine starting...");

    let config = Config::load("config/config.yaml").map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. config/config.yaml exists\n\
             2. All required environment variables are set\n\
             3. Create a .env file if needed",
            e
        )
    })?;
    info!("Configuration loaded");

    let client = adapters::http_client(&config.fetch.user_agent)?;

    // Region registry: hand-curated table now, discovered table in background
    let registry = Arc::new(RegionRegistry::new(&config.registry, client.clone()));
    info!("Region registry ready: {} curated regions", registry.curated_count());
    registry.ensure_discovery_started();

    // Gauge cache: warm from disk/blob, then keep rebuilt on a schedule
    let blob = config
        .blob
        .as_ref()
        .map(|blob_config| BlobStore::new(blob_config, client.clone()));
    let cache = Arc::new(GaugeCache::new(&config.cache, blob));
    if cache.warm().await {
        if let Some(meta) = cache.meta() {
            info!(
                "Serving gauge cache built {} ({} gauges)",
                meta.built, meta.gauge_count
            );
        }
    } else {
        info!("Gauge cache cold; first scheduled rebuild will populate it");
    }

    // Set up shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let nwps = NwpsClient::new(client);
    let mut scheduler =
        RebuildScheduler::new(config.scheduler.clone(), nwps, Arc::clone(&cache), shutdown_rx);
    scheduler.run().await;

    info!("Water quality reconciliation engine shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
