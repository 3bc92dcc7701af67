//! Cloudflare client behaviour against a mock API

use ddns_core::ProviderError;
use ddns_core::traits::{DnsProvider, RecordFilter, RecordUpdate};
use ddns_provider_cloudflare::{CloudflareProvider, Credentials};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> CloudflareProvider {
    CloudflareProvider::new(Credentials::Token("test-token".into()), false)
        .unwrap()
        .with_base_url(server.uri())
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
    }))
}

fn record_json(id: &str, name: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "zone_id": "z1",
        "zone_name": "example.com",
        "name": name,
        "type": "A",
        "content": content,
        "proxiable": true,
        "proxied": false,
        "ttl": 300,
        "modified_on": "2024-05-01T12:00:00.123456Z",
    })
}

#[tokio::test]
async fn test_list_zones_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{"id": "z1", "name": "example.com", "status": "active"}],
            "result_info": {"page": 1, "per_page": 1, "count": 1, "total_count": 2, "total_pages": 2},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{"id": "z2", "name": "example.org", "status": "active"}],
            "result_info": {"page": 2, "per_page": 1, "count": 1, "total_count": 2, "total_pages": 2},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let zones = provider(&server).list_zones().await.unwrap();

    let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
    assert_eq!(names, vec!["example.com", "example.org"]);
}

#[tokio::test]
async fn test_legacy_key_pair_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(header("X-Auth-Email", "ops@example.com"))
        .and(header("X-Auth-Key", "global-key"))
        .respond_with(ok(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CloudflareProvider::new(
        Credentials::KeyPair {
            email: "ops@example.com".into(),
            key: "global-key".into(),
        },
        false,
    )
    .unwrap()
    .with_base_url(server.uri());

    assert!(provider.list_zones().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_records_sends_exact_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/z1/dns_records"))
        .and(query_param("name", "www.example.com"))
        .and(query_param("type", "A"))
        .respond_with(ok(json!([record_json("r1", "www.example.com", "10.0.0.1")])))
        .expect(1)
        .mount(&server)
        .await;

    let records = provider(&server)
        .get_records("z1", &RecordFilter::exact("www.example.com", "A"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "r1");
    assert_eq!(records[0].record_type, "A");
    assert_eq!(records[0].ttl, 300);
    assert!(records[0].modified_on.is_some());
}

#[tokio::test]
async fn test_update_sends_only_given_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/zones/z1/dns_records/r1"))
        .and(body_json(json!({"content": "10.0.0.2", "type": "A"})))
        .respond_with(ok(record_json("r1", "www.example.com", "10.0.0.2")))
        .expect(1)
        .mount(&server)
        .await;

    let record = provider(&server)
        .update_record("z1", "r1", &RecordUpdate::content("10.0.0.2", "A"))
        .await
        .unwrap();

    assert_eq!(record.content, "10.0.0.2");
}

#[tokio::test]
async fn test_update_carries_preserved_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/zones/z1/dns_records/r1"))
        .and(body_json(json!({
            "content": "10.0.0.2",
            "type": "A",
            "name": "www.example.com",
            "ttl": 120,
            "proxied": true,
        })))
        .respond_with(ok(record_json("r1", "www.example.com", "10.0.0.2")))
        .expect(1)
        .mount(&server)
        .await;

    let update = RecordUpdate {
        name: Some("www.example.com".into()),
        ttl: Some(120),
        proxied: Some(true),
        ..RecordUpdate::content("10.0.0.2", "A")
    };
    provider(&server)
        .update_record("z1", "r1", &update)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dry_run_never_writes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let provider = CloudflareProvider::new(Credentials::Token("t".into()), true)
        .unwrap()
        .with_base_url(server.uri());

    let record = provider
        .update_record("z1", "r1", &RecordUpdate::content("10.0.0.2", "A"))
        .await
        .unwrap();

    assert_eq!(record.id, "r1");
    assert_eq!(record.content, "10.0.0.2");
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "errors": [{"code": 9109, "message": "Invalid access token"}],
            "result": null,
        })))
        .mount(&server)
        .await;

    let err = provider(&server).list_zones().await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::ApiRejected {
            status: Some(403),
            ..
        }
    ));
    assert!(err.is_auth_failure());
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Invalid access token"));
}

#[tokio::test]
async fn test_unstructured_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .get_records("z1", &RecordFilter::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::Http {
            status: 502,
            body: "<html>Bad gateway</html>".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_envelope_failure_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 9005, "message": "Content for A record is invalid"}],
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .update_record("z1", "r1", &RecordUpdate::content("bogus", "A"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(!err.is_retryable());
    assert!(!err.is_auth_failure());
}

#[tokio::test]
async fn test_success_without_result_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
        })))
        .mount(&server)
        .await;

    let err = provider(&server).list_zones().await.unwrap_err();

    assert!(matches!(err, ProviderError::ApiRejected { .. }));
    assert!(err.to_string().contains("without a result"));
}

#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "success": false,
            "errors": [{"code": 10000, "message": "Rate limited"}],
        })))
        .mount(&server)
        .await;

    let err = provider(&server).list_zones().await.unwrap_err();
    assert_eq!(err.status(), Some(429));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ok(json!([])).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let provider = CloudflareProvider::with_timeout(
        Credentials::Token("t".into()),
        false,
        Duration::from_millis(200),
    )
    .unwrap()
    .with_base_url(server.uri());

    let err = provider.list_zones().await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Transport {
            timed_out: true,
            ..
        }
    ));
    assert_eq!(err.status(), None);
    assert!(err.is_retryable());
}
