//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a temp-dir storage root, snapshot
//! files, and a full [`AppContext`]. The [`with_server`] constructor starts
//! Axum on a random port for HTTP-level testing.

use std::net::SocketAddr;
use std::sync::Arc;

use clipvault::config::Config;
use clipvault::server::{create_router, AppContext};
use clipvault::storage::MediaStorage;
use clipvault::store::VideoStore;
use clipvault::webhooks::WebhookRegistry;
use tempfile::TempDir;

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// temporary storage directory.
pub struct TestHarness {
    pub ctx: AppContext,
    _data_dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration. The storage root
    /// is always redirected into a fresh temp dir.
    pub fn with_config(mut config: Config) -> Self {
        let data_dir = tempfile::tempdir().expect("failed to create temp dir");
        config.storage.root = data_dir.path().to_path_buf();

        let storage = MediaStorage::new(config.storage.root.clone());
        storage.ensure_root().expect("failed to create storage root");

        let store = VideoStore::open(config.storage.videos_db_path());
        let webhooks = WebhookRegistry::open(config.storage.webhooks_db_path());

        let ctx = AppContext {
            store,
            webhooks,
            storage,
            config: Arc::new(config),
        };

        Self {
            ctx,
            _data_dir: data_dir,
        }
    }

    /// Start an Axum server on a random port and return the harness
    /// together with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

/// Upload `data` as multipart field `file` and return the response.
pub async fn upload(
    client: &reqwest::Client,
    addr: SocketAddr,
    filename: &str,
    data: &[u8],
) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(data.to_vec())
        .file_name(filename.to_string())
        .mime_str("video/mp4")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("file", part);

    client
        .post(format!("http://{addr}/api/videos"))
        .multipart(form)
        .send()
        .await
        .unwrap()
}
