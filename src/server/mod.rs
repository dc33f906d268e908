pub mod handlers;
pub mod scheduler;

use crate::core::etl::EtlEngine;
use crate::domain::ports::{Pipeline, ResponseCache};
use crate::utils::error::Result;
use axum::{http::Method, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub max_age: Duration,
    pub expose_error_details: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            expose_error_details: false,
        }
    }
}

pub struct AppState<P: Pipeline, R: ResponseCache> {
    pub engine: Arc<EtlEngine<P>>,
    pub cache: Arc<R>,
    pub settings: HttpSettings,
}

impl<P: Pipeline, R: ResponseCache> AppState<P, R> {
    pub fn new(engine: Arc<EtlEngine<P>>, cache: R, settings: HttpSettings) -> Self {
        Self {
            engine,
            cache: Arc::new(cache),
            settings,
        }
    }
}

/// Routes: `GET /` and `GET /credits.json` serve the snapshot, `GET /health`.
/// OPTIONS preflight is answered by the CORS layer.
pub fn create_router<P, R>(state: Arc<AppState<P, R>>) -> Router
where
    P: Pipeline + 'static,
    R: ResponseCache + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/", get(handlers::credits::<P, R>))
        .route("/credits.json", get(handlers::credits::<P, R>))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
