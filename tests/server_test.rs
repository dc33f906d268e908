use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use credits_relay::domain::ports::{CachedResponse, ResponseCache, Storage};
use credits_relay::server::{create_router, AppState, HttpSettings};
use credits_relay::{
    CreditsPipeline, EtlEngine, EtlError, MemoryResponseCache, MemoryStorage, ServiceConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const CSV_EXPORT: &str = "Release,Display Name,Location\r\n\
                          true,Sign,Tokyo\r\n\
                          true,Sign,Tokyo\r\n\
                          false,Other,Osaka\r\n";

fn config_for(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.source.base_url = server.base_url();
    config.source.doc_id = "doc".to_string();
    config.source.api_key = "secret".to_string();
    config
}

fn build_app(server: &MockServer, storage: MemoryStorage, settings: HttpSettings) -> Router {
    build_app_with_cache(server, storage, MemoryResponseCache::new(), settings)
}

fn build_app_with_cache<R: ResponseCache + 'static>(
    server: &MockServer,
    storage: MemoryStorage,
    cache: R,
    settings: HttpSettings,
) -> Router {
    let pipeline = CreditsPipeline::new(storage, config_for(server)).unwrap();
    let engine = Arc::new(EtlEngine::new(pipeline));
    create_router(Arc::new(AppState::new(engine, cache, settings)))
}

/// Cache whose every call fails, counting how often it was asked.
#[derive(Default)]
struct BrokenCache {
    lookups: Arc<AtomicUsize>,
    stores: Arc<AtomicUsize>,
}

impl ResponseCache for BrokenCache {
    async fn lookup(&self, _url: &str) -> credits_relay::Result<Option<CachedResponse>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Err(EtlError::storage("cache backend unavailable"))
    }

    async fn store(&self, _url: &str, _response: CachedResponse) -> credits_relay::Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Err(EtlError::storage("cache backend unavailable"))
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::ORIGIN, "https://example.org")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_cache_miss_then_hit_fetches_upstream_once() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/docs/doc/download/csv")
                .header("Authorization", "Bearer secret");
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let storage = MemoryStorage::new();
    let app = build_app(&server, storage.clone(), HttpSettings::default());

    let (status, headers, first_body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");
    assert!(storage.get("credits.json").await.unwrap().is_some());

    let records: serde_json::Value = serde_json::from_str(&first_body).unwrap();
    assert_eq!(
        records,
        serde_json::json!([{"Release": "true", "Display Name": "Sign", "Location": "Tokyo"}])
    );

    // 背景寫入快取之後，同一個 URL 應該直接命中
    let mut cache_state = String::new();
    for _ in 0..50 {
        let (status, headers, body) = get(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, first_body);
        cache_state = headers["x-cache"].to_str().unwrap().to_string();
        if cache_state == "HIT" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(cache_state, "HIT");
    assert_eq!(api_mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_success_response_headers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let app = build_app(&server, MemoryStorage::new(), HttpSettings::default());
    let (status, headers, _) = get(&app, "/credits.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
}

#[tokio::test]
async fn test_stored_snapshot_is_served_without_fetch() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let storage = MemoryStorage::new();
    storage
        .put("credits.json", br#"[{"Location":"Kyoto"}]"#, "application/json")
        .await
        .unwrap();

    let app = build_app(&server, storage, HttpSettings::default());
    let (status, _, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"[{"Location":"Kyoto"}]"#);
    assert_eq!(api_mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_upstream_failure_returns_500_without_storing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(503);
        })
        .await;

    let storage = MemoryStorage::new();
    let app = build_app(&server, storage.clone(), HttpSettings::default());

    let (status, headers, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let message = json["error"].as_str().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("503"));
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_error_details_exposed_when_configured() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(401);
        })
        .await;

    let settings = HttpSettings {
        expose_error_details: true,
        ..HttpSettings::default()
    };
    let app = build_app(&server, MemoryStorage::new(), settings);

    let (status, _, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Grist API error: 401");
}

#[tokio::test]
async fn test_failed_request_is_not_cached() {
    let server = MockServer::start_async().await;
    let mut failing = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(500);
        })
        .await;

    let app = build_app(&server, MemoryStorage::new(), HttpSettings::default());
    let (status, _, _) = get(&app, "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    failing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let (status, headers, _) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");
}

#[tokio::test]
async fn test_query_string_does_not_create_cache_entries() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let cache = MemoryResponseCache::new();
    let app = build_app_with_cache(
        &server,
        MemoryStorage::new(),
        cache.clone(),
        HttpSettings::default(),
    );

    let (status, headers, first_body) = get(&app, "/?x=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");

    for _ in 0..50 {
        if cache.len().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cache.len().await, 1);

    for i in 2..20 {
        let (status, headers, body) = get(&app, &format!("/?x={}", i)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-cache"], "HIT");
        assert_eq!(body, first_body);
    }

    assert_eq!(cache.len().await, 1);
    assert_eq!(api_mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_broken_cache_never_affects_response() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body(CSV_EXPORT);
        })
        .await;

    let cache = BrokenCache::default();
    let lookups = cache.lookups.clone();
    let stores = cache.stores.clone();
    let storage = MemoryStorage::new();
    let app = build_app_with_cache(&server, storage.clone(), cache, HttpSettings::default());

    // lookup 失敗時照樣走 storage / 上游
    let (status, headers, first_body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");
    let records: serde_json::Value = serde_json::from_str(&first_body).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert!(storage.get("credits.json").await.unwrap().is_some());

    for _ in 0..50 {
        if stores.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stores.load(Ordering::SeqCst), 1);

    // 第二次從 storage 取回，仍然是 200 且內容一致
    let (status, headers, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(body, first_body);
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
    assert_eq!(api_mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_options_preflight() {
    let server = MockServer::start_async().await;
    let app = build_app(&server, MemoryStorage::new(), HttpSettings::default());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/")
                .header(header::ORIGIN, "https://example.org")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("GET"));
    assert!(methods.contains("OPTIONS"));
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start_async().await;
    let app = build_app(&server, MemoryStorage::new(), HttpSettings::default());

    let (status, _, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
