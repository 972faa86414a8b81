// HTTP 读取/写入与缓存端到端测试（wiremock 模拟 json.cf 服务端）

use jsoncf::{CacheError, CacheOptions, ConfigCache, ConfigWriter, FetchAdapter, HttpFetcher};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn success(data: serde_json::Value) -> serde_json::Value {
    json!({
        "success": true,
        "data": data,
        "error": null,
        "metadata": {"timestamp": 1_700_000_000_000_i64}
    })
}

fn failure(message: &str) -> serde_json::Value {
    json!({
        "success": false,
        "data": null,
        "error": {"message": message},
        "metadata": {"timestamp": 1_700_000_000_000_i64}
    })
}

fn metadata() -> serde_json::Value {
    json!({
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-02T00:00:00Z"
    })
}

#[tokio::test]
async fn test_fetch_document_with_secret_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/abc"))
        .and(header("authorization", "Bearer s3cret"))
        .and(header("x-config-secret", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({"flag": true}))))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher.fetch_document("abc", Some("s3cret")).await.unwrap();

    assert!(envelope.error.is_none());
    assert_eq!(envelope.data.get("flag"), Some(&json!(true)));
    assert_eq!(envelope.metadata.timestamp, 1_700_000_000_000);
}

#[tokio::test]
async fn test_fetch_document_not_found_is_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(failure("Config could not be found.")))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher.fetch_document("nope", None).await.unwrap();

    assert!(envelope.data.is_empty());
    assert_eq!(
        envelope.error.as_deref(),
        Some("Failed to fetch all configs: Config could not be found.")
    );
}

#[tokio::test]
async fn test_fetch_document_array_becomes_empty_map() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!([{"a": 1}]))))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher.fetch_document("list", None).await.unwrap();
    assert!(envelope.data.is_empty());
    assert!(envelope.error.is_none());
}

#[tokio::test]
async fn test_fetch_key_encodes_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/abc/kv/feature%20flags/beta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!("on"))))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher
        .fetch_key("abc", "feature flags/beta", None)
        .await
        .unwrap();
    assert_eq!(envelope.data, json!("on"));
}

#[tokio::test]
async fn test_fetch_key_unauthorized_without_body_uses_status_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/private/kv/a"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher.fetch_key("private", "a", None).await.unwrap();
    assert_eq!(envelope.data, serde_json::Value::Null);
    assert_eq!(
        envelope.error.as_deref(),
        Some("Failed to fetch config: Unauthorized")
    );
}

#[tokio::test]
async fn test_undecodable_body_is_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/config/abc/kv/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(server.uri()).unwrap();
    let envelope = fetcher.fetch_document("abc", None).await.unwrap();
    assert!(envelope.data.is_empty());
    assert!(envelope
        .error
        .unwrap()
        .starts_with("Failed to fetch all configs: "));

    let envelope = fetcher.fetch_key("abc", "a", None).await.unwrap();
    assert_eq!(envelope.data, serde_json::Value::Null);
    assert!(envelope.error.unwrap().starts_with("Failed to fetch config: "));
}

#[tokio::test]
async fn test_undecodable_body_counts_as_completed_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let options = CacheOptions::new("abc")
        .with_base_url(server.uri())
        .with_cache_timeout(Duration::from_secs(60));
    let cache = ConfigCache::new(options).unwrap();

    // 已收到响应：计入新鲜窗口，不会立即重试
    let state = cache.get_document().await.unwrap();
    assert!(!state.loading);
    assert!(state.error.is_some());
    assert!(cache.is_document_fresh());

    cache.request_document().await;
    cache.request_document().await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_writer_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config"))
        .and(body_json(json!({"theme": "dark"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(success(json!({
            "id": "abcdefghijklmn",
            "secret": "5f0c6b8e-0000-4000-8000-000000000000",
            "config": {"theme": "dark"},
            "metadata": metadata()
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let writer = ConfigWriter::new(server.uri()).unwrap();
    let created = writer.create(r#"{"theme": "dark"}"#).await.unwrap();
    assert_eq!(created.id, "abcdefghijklmn");
    assert_eq!(created.config, json!({"theme": "dark"}));
}

#[tokio::test]
async fn test_writer_update_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/config/abc"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(failure("Invalid or missing secret for private config.")),
        )
        .mount(&server)
        .await;

    let writer = ConfigWriter::new(server.uri()).unwrap();
    let err = writer
        .update("abc", Some("wrong"), r#"{"a": 1}"#)
        .await
        .unwrap_err();
    match err {
        CacheError::Http { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid or missing secret for private config.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_cache_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({"flag": true}))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/config/abc/kv/missing/path"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(failure("Config key could not be found.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = CacheOptions::new("abc")
        .with_base_url(server.uri())
        .with_cache_timeout(Duration::from_secs(60));
    let cache = ConfigCache::new(options).unwrap();

    let document = cache.get_document().await.unwrap();
    assert_eq!(document.data.unwrap().get("flag"), Some(&json!(true)));
    cache.request_document().await;

    let missing = cache.get("missing/path").await.unwrap();
    assert_eq!(missing.data, None);
    assert!(!missing.loading);
    assert_eq!(
        missing.error.as_deref(),
        Some("Failed to fetch config: Config key could not be found.")
    );
    cache.request_key("missing/path").await;
}

#[tokio::test]
async fn test_update_document_refreshes_cache() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/config/abc"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({
            "id": "abc",
            "config": {"v": 2},
            "metadata": metadata()
        }))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/config/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({"v": 2}))))
        .expect(1)
        .mount(&server)
        .await;

    let options = CacheOptions::new("abc")
        .with_secret("s3cret")
        .with_base_url(server.uri());
    let cache = ConfigCache::new(options).unwrap();

    let updated = cache.update_document(r#"{"v": 2}"#).await.unwrap();
    assert_eq!(updated.config, json!({"v": 2}));
    assert_eq!(
        cache.document_snapshot().data.unwrap().get("v"),
        Some(&json!(2))
    );
    assert!(cache.is_document_fresh());
}

#[tokio::test]
async fn test_unreachable_server() {
    // 端口 9 (discard) 在测试环境中通常无人监听
    let options = CacheOptions::new("abc").with_base_url("http://127.0.0.1:9");
    let cache = ConfigCache::new(options).unwrap();

    let err = cache.get("a").await.unwrap_err();
    assert!(matches!(err, CacheError::Unreachable(_)));
    assert!(!cache.is_key_fresh("a"));
}
