//! HTTP client and full HTTP-backed sync against a mock catalog API.

use catalog_cache::{
    CatalogCache, CatalogCacheConfig, CatalogEndpoints, CatalogError, ErrorCategory,
    HttpCatalogClient, NetworkConfig, RemoteCatalogClient, SearchOptions, SyncKind, VersionToken,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> CatalogCacheConfig {
    CatalogCacheConfig {
        base_url: format!("{}/api", server.uri()),
        ..CatalogCacheConfig::default()
    }
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_version_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .and(header("user-agent", NetworkConfig::USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "v1", "count": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCatalogClient::from_config(&config_for(&server)).unwrap();
    let body = client.fetch_version().await.unwrap();
    assert_eq!(body["version"], "v1");
}

#[tokio::test]
async fn test_fetch_page_and_updates_pass_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/export"))
        .and(query_param("page", "3"))
        .and(query_param("limit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "pagination": {"total": 0, "hasMore": false}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/updates"))
        .and(query_param("since", "2024-06-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"version": "v2", "updates": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCatalogClient::from_config(&config_for(&server)).unwrap();
    client.fetch_page(3, 500).await.unwrap();
    client
        .fetch_updates(&VersionToken::new("2024-06-01T00:00:00Z"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/updates"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpCatalogClient::from_config(&config_for(&server)).unwrap();

    let err = client.fetch_version().await.unwrap_err();
    assert!(matches!(err, CatalogError::HttpStatus { status: 503, .. }));
    assert!(err.is_retryable());

    let err = client.fetch_updates(&VersionToken::new("v1")).await.unwrap_err();
    assert!(matches!(err, CatalogError::HttpStatus { status: 404, .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = HttpCatalogClient::from_config(&config_for(&server)).unwrap();
    let err = client.fetch_version().await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"version": "v1"}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = CatalogCacheConfig {
        request_timeout_secs: 1,
        ..config_for(&server)
    };
    let client = HttpCatalogClient::from_config(&config).unwrap();
    let err = client.fetch_version().await.unwrap_err();
    assert!(matches!(err, CatalogError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_custom_endpoints_are_used() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/medicines/version", json!({"version": 12, "count": 0})).await;

    let config = CatalogCacheConfig {
        endpoints: CatalogEndpoints {
            version: "medicines/version".to_string(),
            export: "medicines/export".to_string(),
            updates: "medicines/updates".to_string(),
        },
        ..config_for(&server)
    };
    let client = HttpCatalogClient::from_config(&config).unwrap();
    assert_eq!(client.fetch_version().await.unwrap()["version"], 12);
}

#[tokio::test]
async fn test_bad_payload_on_custom_route_names_payload_kind() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/medicines/version", json!({"version": "v1", "count": 1})).await;
    mount_json(
        &server,
        "/api/medicines/export",
        json!({"data": [{"id": "1", "primaryName": "Aspirin"}]}),
    )
    .await;

    let config = CatalogCacheConfig {
        endpoints: CatalogEndpoints {
            version: "medicines/version".to_string(),
            export: "medicines/export".to_string(),
            updates: "medicines/updates".to_string(),
        },
        ..config_for(&server)
    };
    let cache = CatalogCache::builder()
        .in_memory()
        .http_remote(config)
        .build()
        .unwrap();

    let err = cache.sync_with_server().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidResponse);
    let message = err.to_string();
    assert!(message.contains("export page"), "{message}");
    assert!(!message.contains("catalog/export"), "{message}");
    assert_eq!(cache.get_cache_info().unwrap().count, 0);
}

#[tokio::test]
async fn test_full_then_incremental_sync_over_http() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/catalog/version", json!({"version": "v1", "count": 3})).await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/export"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "1", "name": "Paracetamol 500mg", "usageCount": 10},
                {"id": "2", "name": "Paracetamol 650mg", "usageCount": 50}
            ],
            "pagination": {"total": 3, "hasMore": true}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/export"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "3", "name": "Ibuprofen 400mg", "usageCount": 5}],
            "pagination": {"total": 3, "hasMore": false}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = CatalogCache::builder()
        .in_memory()
        .http_remote(config_for(&server))
        .page_size(2)
        .build()
        .unwrap();

    let outcome = cache.sync_with_server().await.unwrap();
    assert_eq!(outcome.kind, SyncKind::Full);
    assert_eq!(outcome.synced_count, 3);

    let ids: Vec<String> = cache
        .search("paracetmol", SearchOptions::with_limit(5))
        .unwrap()
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(ids, ["2", "1"]);

    server.reset().await;
    mount_json(&server, "/api/catalog/version", json!({"version": "v2", "count": 2})).await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/updates"))
        .and(query_param("since", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "version": "v2",
                "updates": [{"id": "3", "status": "DISCONTINUED"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = cache.sync_with_server().await.unwrap();
    assert_eq!(outcome.kind, SyncKind::Incremental);
    assert_eq!(outcome.removed, 1);

    let info = cache.get_cache_info().unwrap();
    assert_eq!(info.count, 2);
    assert_eq!(info.version, Some(VersionToken::new("v2")));
}
