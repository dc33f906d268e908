use crate::domain::ports::{CachedResponse, Pipeline, ResponseCache};
use crate::server::{AppState, HttpSettings};
use crate::utils::error::EtlError;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::Instrument;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn as_header(self) -> HeaderValue {
        match self {
            CacheStatus::Hit => HeaderValue::from_static("HIT"),
            CacheStatus::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers
}

fn snapshot_response(body: String, settings: &HttpSettings, cache: CacheStatus) -> Response {
    let mut headers = cors_headers();
    let cache_control = format!("public, max-age={}", settings.max_age.as_secs());
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(X_CACHE, cache.as_header());

    (StatusCode::OK, headers, body).into_response()
}

/// Failure response: full error goes to the log, the client sees the category
/// message unless `expose_details` is set.
pub struct ApiError {
    error: EtlError,
    expose_details: bool,
}

impl ApiError {
    pub fn new(error: EtlError, expose_details: bool) -> Self {
        Self {
            error,
            expose_details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(
            "❌ Request failed: {} (Category: {:?})",
            self.error,
            self.error.category()
        );

        let message = if self.expose_details {
            self.error.to_string()
        } else {
            self.error.public_message().to_string()
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            cors_headers(),
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

/// Edge cache → durable store → upstream refresh.
pub async fn credits<P, R>(State(state): State<Arc<AppState<P, R>>>, uri: Uri) -> Response
where
    P: Pipeline + 'static,
    R: ResponseCache + 'static,
{
    let span = tracing::info_span!("request", method = "GET", path = %uri.path());
    serve_credits(state, uri).instrument(span).await
}

async fn serve_credits<P, R>(state: Arc<AppState<P, R>>, uri: Uri) -> Response
where
    P: Pipeline + 'static,
    R: ResponseCache + 'static,
{
    // 查詢字串不進快取鍵，避免同一份快照被重複存放
    let cache_key = uri.path().to_string();

    match state.cache.lookup(&cache_key).await {
        Ok(Some(hit)) => {
            tracing::debug!("Response cache hit for {}", cache_key);
            return snapshot_response(hit.body, &state.settings, CacheStatus::Hit);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Response cache lookup failed for {}: {}", cache_key, e),
    }

    let snapshot = match state.engine.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return ApiError::new(e, state.settings.expose_error_details).into_response(),
    };

    let response = snapshot_response(snapshot.body.clone(), &state.settings, CacheStatus::Miss);

    if !state.settings.max_age.is_zero() {
        let entry = CachedResponse {
            body: snapshot.body,
            max_age: state.settings.max_age,
        };
        spawn_cache_fill(state.cache.clone(), cache_key, entry);
    }

    response
}

/// Fire-and-forget: errors are logged and never reach the caller.
fn spawn_cache_fill<R: ResponseCache + 'static>(cache: Arc<R>, key: String, entry: CachedResponse) {
    tokio::spawn(
        async move {
            if let Err(e) = cache.store(&key, entry).await {
                tracing::warn!("Failed to populate response cache for {}: {}", key, e);
            }
        }
        .in_current_span(),
    );
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "credits-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
