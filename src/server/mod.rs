use crate::config::Config;
use crate::persist::Snapshot;
use crate::storage::MediaStorage;
use crate::store::VideoStore;
use crate::webhooks::WebhookRegistry;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_videos;
pub mod routes_webhooks;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<VideoStore>,
    pub webhooks: Arc<WebhookRegistry>,
    pub storage: MediaStorage,
    pub config: Arc<Config>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    Router::new()
        .route("/health", get(health_check))
        .merge(routes_videos::routes())
        .merge(routes_webhooks::routes())
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "route not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}

pub(crate) fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let storage = MediaStorage::new(config.storage.root.clone());
    storage.ensure_root()?;

    let store = VideoStore::open(config.storage.videos_db_path());
    let webhooks = WebhookRegistry::open(config.storage.webhooks_db_path());

    let ctx = AppContext {
        store: store.clone(),
        webhooks: webhooks.clone(),
        storage,
        config: Arc::new(config),
    };

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final flush so state mutated since the last background write
    // survives the shutdown.
    if let Err(e) = store.write_snapshot() {
        tracing::warn!("Failed to write final video store snapshot: {:#}", e);
    }
    if let Err(e) = webhooks.write_snapshot() {
        tracing::warn!("Failed to write final webhook snapshot: {:#}", e);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
