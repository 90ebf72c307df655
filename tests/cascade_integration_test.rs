use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wq_engine::adapters::echo::EchoAdapter;
use wq_engine::adapters::socrata::{SocrataAdapter, SocrataResource};
use wq_engine::adapters::usgs::UsgsAdapter;
use wq_engine::adapters::wqp::WqpAdapter;
use wq_engine::adapters::SourceAdapter;
use wq_engine::cascade::Cascade;
use wq_engine::config::{FetchConfig, RegistryConfig};
use wq_engine::registry::{RegionMeta, RegionRegistry};

fn nwis_body(do_value: f64) -> serde_json::Value {
    serde_json::json!({
        "value": {
            "timeSeries": [{
                "sourceInfo": {"siteName": "PATAPSCO RIVER AT BALTIMORE, MD"},
                "variable": {
                    "variableCode": [{"value": "00300"}],
                    "unit": {"unitCode": "mg/l"}
                },
                "values": [{"value": [
                    {"value": "6.5", "dateTime": "2025-06-01T10:00:00.000-04:00"},
                    {"value": do_value.to_string(), "dateTime": "2025-06-01T11:00:00.000-04:00"}
                ]}]
            }]
        }
    })
}

fn wqp_body() -> serde_json::Value {
    serde_json::json!([
        {
            "CharacteristicName": "Dissolved oxygen (DO)",
            "ResultMeasureValue": "5.8",
            "ResultMeasure/MeasureUnitCode": "mg/L",
            "ActivityStartDate": "2025-05-28",
            "MonitoringLocationName": "Inner Harbor Pier 5"
        },
        {
            "CharacteristicName": "pH",
            "ResultMeasureValue": "7.1",
            "ResultMeasure/MeasureUnitCode": "std units",
            "ActivityStartDate": "2025-05-28",
            "MonitoringLocationName": "Inner Harbor Pier 5"
        },
        {
            "CharacteristicName": "Not A Real Characteristic",
            "ResultMeasureValue": "999",
            "ActivityStartDate": "2025-05-28"
        }
    ])
}

fn cascade_for(
    tiers: Vec<Vec<Arc<dyn SourceAdapter>>>,
    timeout_seconds: u64,
) -> Cascade {
    let registry = Arc::new(RegionRegistry::new(
        &RegistryConfig::default(),
        reqwest::Client::new(),
    ));
    let fetch = FetchConfig {
        adapter_timeout_seconds: timeout_seconds,
        ..FetchConfig::default()
    };
    Cascade::new(registry, tiers, &fetch)
}

/// The worked example: adapter A reports DO=7.2, lower-priority adapter B
/// reports DO=5.8 and pH=7.1. Expected: DO from A, pH from B, sources [A, B].
#[tokio::test]
async fn test_priority_merge_across_real_adapters() {
    let usgs_server = MockServer::start().await;
    let wqp_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nwis/iv/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nwis_body(7.2)))
        .mount(&usgs_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/Result/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wqp_body()))
        .mount(&wqp_server)
        .await;

    let client = reqwest::Client::new();
    let usgs = Arc::new(UsgsAdapter::with_base_url(client.clone(), 10.0, &usgs_server.uri()));
    let wqp = Arc::new(WqpAdapter::with_base_url(client, 10.0, &wqp_server.uri()));
    let cascade = cascade_for(vec![vec![usgs], vec![wqp]], 12);

    let result = cascade.aggregate("baltimore-harbor").await;

    assert!(result.has_real_data);
    assert!(result.has_live_data);
    assert_eq!(result.readings["DO"].value, 7.2);
    assert_eq!(result.readings["DO"].source, "usgs-nwis");
    assert_eq!(result.readings["pH"].value, 7.1);
    assert_eq!(result.readings["pH"].source, "wqp-portal");
    assert_eq!(result.primary_source(), Some("usgs-nwis"));
    assert_eq!(result.sources[0], "usgs-nwis");
    assert_eq!(result.sources[1], "wqp-portal");
    assert_eq!(result.station.as_deref(), Some("PATAPSCO RIVER AT BALTIMORE, MD"));
}

/// A provider that answers after the deadline contributes nothing; the
/// cascade falls through to the next tier.
#[tokio::test]
async fn test_slow_provider_times_out_and_cascade_continues() {
    let usgs_server = MockServer::start().await;
    let wqp_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nwis/iv/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(nwis_body(7.2))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&usgs_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/Result/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wqp_body()))
        .mount(&wqp_server)
        .await;

    let client = reqwest::Client::new();
    let usgs = Arc::new(UsgsAdapter::with_base_url(client.clone(), 10.0, &usgs_server.uri()));
    let wqp = Arc::new(WqpAdapter::with_base_url(client, 10.0, &wqp_server.uri()));
    let cascade = cascade_for(vec![vec![usgs], vec![wqp]], 1);

    let result = cascade.aggregate("baltimore-harbor").await;

    // USGS timed out, so WQP's lower-priority DO value fills the gap
    assert_eq!(result.readings["DO"].value, 5.8);
    assert_eq!(result.readings["DO"].source, "wqp-portal");
    assert!(!result.sources.iter().any(|s| s == "usgs-nwis"));
}

/// All network calls failing for a region with a known site id: aggregation
/// falls through to the static reference table.
#[tokio::test]
async fn test_total_network_failure_degrades_to_reference() {
    let dead_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&dead_server)
        .await;

    let client = reqwest::Client::new();
    let usgs = Arc::new(UsgsAdapter::with_base_url(client.clone(), 10.0, &dead_server.uri()));
    let wqp = Arc::new(WqpAdapter::with_base_url(client, 10.0, &dead_server.uri()));
    let cascade = cascade_for(vec![vec![usgs], vec![wqp]], 2);

    let result = cascade.aggregate("baltimore-harbor").await;

    assert!(result.has_real_data);
    assert!(!result.has_live_data);
    assert_eq!(result.primary_source(), Some("reference"));
    assert!(result.readings.contains_key("DO"));
    assert!(result.readings.values().all(|r| r.source == "reference"));
}

#[tokio::test]
async fn test_echo_enrichment_reports_violation_count() {
    let echo_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo/cwa_rest_services.get_facilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Results": {"QueryRows": "17", "Facilities": []}
        })))
        .mount(&echo_server)
        .await;

    let adapter = EchoAdapter::with_base_url(reqwest::Client::new(), &echo_server.uri());
    let meta = RegionMeta {
        id: "baltimore-harbor".to_string(),
        name: "Baltimore Inner Harbor".to_string(),
        latitude: 39.263,
        longitude: -76.623,
        huc8: "02060003".to_string(),
        state: "MD".to_string(),
        usgs_site: None,
        wqp_site: None,
        ceden_station: None,
    };
    let missing: HashSet<String> = ["_violations".to_string()].into();

    let readings = adapter
        .fetch(&meta, &missing, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].key, "_violations");
    assert_eq!(readings[0].value, 17.0);
    assert_eq!(readings[0].source, "epa-echo");
}

/// Malformed provider payloads are an adapter failure, not a crash.
#[tokio::test]
async fn test_malformed_response_is_zero_contribution() {
    let usgs_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nwis/iv/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&usgs_server)
        .await;

    let client = reqwest::Client::new();
    let usgs = Arc::new(UsgsAdapter::with_base_url(client, 10.0, &usgs_server.uri()));
    let cascade = cascade_for(vec![vec![usgs]], 2);

    let result = cascade.aggregate("baltimore-harbor").await;
    assert!(!result.sources.iter().any(|s| s == "usgs-nwis"));
    // Reference still fills in
    assert!(result.has_real_data);
}

/// Socrata queries carry the region's bounding box and a newest-first date
/// order; a mock that requires both proves the adapter never issues an
/// unscoped statewide pull.
#[tokio::test]
async fn test_socrata_query_is_scoped_to_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resource/water.json"))
        .and(query_param("$order", "sample_date DESC"))
        .and(query_param_contains("$where", "latitude between"))
        .and(query_param_contains("$where", "longitude between"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "characteristic_name": "pH",
                "result_value": "7.3",
                "sample_date": "2025-06-01",
                "station_name": "Hudson River at Albany",
                "latitude": "42.64",
                "longitude": "-73.75"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut resources = HashMap::new();
    resources.insert(
        "NY".to_string(),
        SocrataResource {
            url: format!("{}/resource/water.json", server.uri()),
            date_field: "sample_date".to_string(),
            latitude_field: "latitude".to_string(),
            longitude_field: "longitude".to_string(),
        },
    );
    let adapter = SocrataAdapter::with_resources(reqwest::Client::new(), resources, 10.0);
    let meta = RegionMeta {
        id: "hudson-albany".to_string(),
        name: "Hudson River at Albany".to_string(),
        latitude: 42.642,
        longitude: -73.747,
        huc8: "02020006".to_string(),
        state: "NY".to_string(),
        usgs_site: None,
        wqp_site: None,
        ceden_station: None,
    };
    let missing: HashSet<String> = ["pH".to_string()].into();

    let readings = adapter
        .fetch(&meta, &missing, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].value, 7.3);
    assert_eq!(readings[0].source, "state-socrata");
    server.verify().await;
}

#[tokio::test]
async fn test_registry_discovery_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/regions.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "lake-erie-cleveland",
                "name": "Lake Erie at Cleveland",
                "latitude": 41.508,
                "longitude": -81.696,
                "huc8": "04110002",
                "state": "OH",
                "usgs_site": "04208000"
            }
        ])))
        .mount(&server)
        .await;

    let config = RegistryConfig {
        discovery_url: Some(format!("{}/regions.json", server.uri())),
    };
    let registry = RegionRegistry::new(&config, reqwest::Client::new());

    // Before the fetch lands, only curated entries resolve
    assert!(registry.resolve("lake-erie-cleveland").is_none());
    assert!(registry.resolve("baltimore-harbor").is_some());

    let count = registry.load_discovered().await.unwrap();
    assert_eq!(count, 1);

    let meta = registry.resolve("lake-erie-cleveland").unwrap();
    assert_eq!(meta.state, "OH");
    assert_eq!(meta.usgs_site.as_deref(), Some("04208000"));
}
