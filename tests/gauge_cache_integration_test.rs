use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wq_engine::adapters::nwps::NwpsClient;
use wq_engine::blob::BlobStore;
use wq_engine::config::{BlobConfig, CacheConfig};
use wq_engine::gauge_cache::{build_grid, GaugeCache};
use wq_engine::model::{FloodStatus, NwpsGauge};

fn gauge(lid: &str, lat: f64, lng: f64) -> NwpsGauge {
    NwpsGauge {
        location_id: lid.to_string(),
        name: format!("Gauge {}", lid),
        state: "MD".to_string(),
        county: "Baltimore".to_string(),
        latitude: lat,
        longitude: lng,
        forecast_office: "LWX".to_string(),
        flood_status: FloodStatus::NoFlooding,
        observed: None,
        forecast: None,
    }
}

fn cache_config(dir: &tempfile::TempDir) -> CacheConfig {
    CacheConfig {
        disk_path: dir
            .path()
            .join("nwps-cache.json")
            .to_string_lossy()
            .into_owned(),
        ..CacheConfig::default()
    }
}

fn blob_config(server: &MockServer) -> BlobConfig {
    BlobConfig {
        endpoint: server.uri(),
        bucket: "caches".to_string(),
        key: "nwps-cache.json".to_string(),
    }
}

/// Instance with no disk file warms from the blob tier.
#[tokio::test]
async fn test_warm_from_blob_when_disk_missing() {
    let server = MockServer::start().await;
    let snapshot = build_grid(vec![gauge("BLTM2", 39.26, -76.62)], 0.1);
    Mock::given(method("GET"))
        .and(path("/caches/nwps-cache.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&snapshot))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let blob = BlobStore::new(&blob_config(&server), reqwest::Client::new());
    let cache = GaugeCache::new(&cache_config(&dir), Some(blob));

    assert!(cache.warm().await);
    let found = cache.lookup(39.26, -76.62).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].location_id, "BLTM2");
    assert_eq!(cache.meta().unwrap().gauge_count, 1);
}

/// Rebuild pushes the fresh snapshot to both persistence tiers.
#[tokio::test]
async fn test_rebuild_uploads_to_blob_and_disk() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/caches/nwps-cache.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = cache_config(&dir);
    let blob = BlobStore::new(&blob_config(&server), reqwest::Client::new());
    let cache = GaugeCache::new(&config, Some(blob));

    let meta = cache.rebuild(vec![gauge("BLTM2", 39.26, -76.62)]).await;
    assert_eq!(meta.gauge_count, 1);
    assert_eq!(meta.grid_cells, 1);

    let body = std::fs::read_to_string(&config.disk_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["meta"]["gaugeCount"], 1);
    assert!(json["grid"]["39.2_-76.7"]["gauges"].is_array());

    server.verify().await;
}

/// Blob tier failing leaves the in-memory structure intact and serving.
#[tokio::test]
async fn test_blob_failure_does_not_break_rebuild() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let blob = BlobStore::new(&blob_config(&server), reqwest::Client::new());
    let cache = GaugeCache::new(&cache_config(&dir), Some(blob));

    cache.rebuild(vec![gauge("BLTM2", 39.26, -76.62)]).await;
    assert!(cache.is_warm());
    assert_eq!(cache.lookup(39.26, -76.62).unwrap().len(), 1);
}

/// Full rebuild pipeline: gauge list over HTTP, bucketed into the grid,
/// persisted to disk, readable after a simulated restart.
#[tokio::test]
async fn test_fetch_build_persist_reload_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gauges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "gauges": [
                {
                    "lid": "BLTM2",
                    "name": "Patapsco River at Baltimore",
                    "state": {"abbreviation": "MD", "name": "Maryland"},
                    "county": "Baltimore",
                    "latitude": 39.26,
                    "longitude": -76.62,
                    "wfo": "LWX",
                    "status": {
                        "observed": {"primary": 3.4, "primaryUnit": "ft", "floodCategory": "no_flooding"}
                    }
                },
                {
                    "lid": "ALBN6",
                    "name": "Hudson River at Albany",
                    "state": "NY",
                    "county": "Albany",
                    "latitude": 42.64,
                    "longitude": -73.75,
                    "wfo": "ALY",
                    "status": {
                        "observed": {"primary": 11.2, "primaryUnit": "ft", "floodCategory": "minor"}
                    }
                },
                {"lid": "NOCOORD", "name": "Unmappable", "state": "TX"}
            ]
        })))
        .mount(&server)
        .await;

    let nwps = NwpsClient::with_base_url(reqwest::Client::new(), &server.uri());
    let gauges = nwps.fetch_gauges(Duration::from_secs(5)).await.unwrap();
    assert_eq!(gauges.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let config = cache_config(&dir);
    let writer = GaugeCache::new(&config, None);
    let meta = writer.rebuild(gauges).await;
    assert_eq!(meta.gauge_count, 2);
    assert_eq!(meta.grid_cells, 2);

    let reader = GaugeCache::new(&config, None);
    assert!(reader.warm().await);
    let near_albany = reader.lookup(42.6417, -73.7476).unwrap();
    assert_eq!(near_albany.len(), 1);
    assert_eq!(near_albany[0].location_id, "ALBN6");
    assert_eq!(near_albany[0].flood_status, FloodStatus::Minor);
    assert_eq!(near_albany[0].observed.as_ref().unwrap().value, 11.2);
}
