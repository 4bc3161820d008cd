//! Webhook subscription registry and best-effort delivery fan-out.
//!
//! Delivery is at-most-one-attempt: one POST per subscriber per event, a
//! 2xx counts as success, everything else is logged and dropped. There is
//! no retry, no backoff and no dead-letter queue; the registry promises
//! fan-out, not receipt.

use crate::persist::{self, Snapshot, SnapshotHandle};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Concurrency-safe mapping from event name to subscriber URLs.
///
/// URLs keep insertion order; duplicates are suppressed on subscribe.
pub struct WebhookRegistry {
    inner: RwLock<HashMap<String, Vec<String>>>,
    db_path: Option<PathBuf>,
    snapshot: OnceLock<SnapshotHandle>,
    client: Client,
}

impl WebhookRegistry {
    /// Create a registry backed by a snapshot file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(db_path: PathBuf) -> Arc<Self> {
        let registry = Arc::new(Self {
            inner: RwLock::new(HashMap::new()),
            db_path: Some(db_path),
            snapshot: OnceLock::new(),
            client: build_client(),
        });

        if let Err(e) = registry.load_from_disk() {
            tracing::warn!("Failed to load webhook snapshot: {:#}", e);
        }

        let handle = persist::spawn_snapshot_writer(&registry);
        let _ = registry.snapshot.set(handle);

        registry
    }

    /// Create a registry with no persistence (tests).
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(HashMap::new()),
            db_path: None,
            snapshot: OnceLock::new(),
            client: build_client(),
        })
    }

    /// Register `url` for `event`. Adding an already-registered URL is a
    /// no-op.
    pub fn subscribe(&self, event: &str, url: &str) {
        {
            let mut inner = self.inner.write();
            let urls = inner.entry(event.to_string()).or_default();
            if urls.iter().any(|u| u == url) {
                return;
            }
            urls.push(url.to_string());
        }
        self.request_snapshot();
    }

    /// Remove `url` from `event`. Removing an absent pair is a no-op.
    pub fn unsubscribe(&self, event: &str, url: &str) {
        let changed = {
            let mut inner = self.inner.write();
            match inner.get_mut(event) {
                Some(urls) => {
                    let before = urls.len();
                    urls.retain(|u| u != url);
                    urls.len() != before
                }
                None => false,
            }
        };

        if changed {
            self.request_snapshot();
        }
    }

    /// Subscriber URLs for one event, in registration order.
    pub fn list(&self, event: &str) -> Vec<String> {
        let inner = self.inner.read();
        inner.get(event).cloned().unwrap_or_default()
    }

    /// All subscriptions, as defensive copies.
    pub fn list_all(&self) -> HashMap<String, Vec<String>> {
        self.inner.read().clone()
    }

    /// Fan out `payload` to every URL currently registered for `event`.
    ///
    /// The subscriber list is snapshotted under a read lock before any
    /// network call; the payload is serialized once and each delivery runs
    /// as its own detached task. Returns immediately.
    pub fn notify(&self, event: &str, payload: &serde_json::Value) {
        let urls = {
            let inner = self.inner.read();
            inner.get(event).cloned().unwrap_or_default()
        };

        if urls.is_empty() {
            return;
        }

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize webhook payload for {}: {}", event, e);
                return;
            }
        };

        for url in urls {
            let client = self.client.clone();
            let body = body.clone();
            tokio::spawn(async move {
                deliver(&client, &url, body).await;
            });
        }
    }

    /// One fire-and-forget delivery outside the subscription system
    /// (subscriber-initiated connectivity tests).
    pub fn deliver_direct(&self, url: &str, payload: &serde_json::Value) {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize webhook payload for {}: {}", url, e);
                return;
            }
        };

        let client = self.client.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            deliver(&client, &url, body).await;
        });
    }

    fn request_snapshot(&self) {
        if let Some(handle) = self.snapshot.get() {
            handle.request();
        }
    }

    fn load_from_disk(&self) -> Result<()> {
        let Some(ref path) = self.db_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
        if content.is_empty() {
            return Ok(());
        }

        let webhooks: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {:?}", path))?;

        let count = webhooks.len();
        *self.inner.write() = webhooks;

        tracing::info!("Loaded {} webhook events from snapshot", count);
        Ok(())
    }
}

impl Snapshot for WebhookRegistry {
    fn label(&self) -> &'static str {
        "webhook registry"
    }

    fn write_snapshot(&self) -> Result<()> {
        let Some(ref path) = self.db_path else {
            return Ok(());
        };

        let webhooks = self.inner.read().clone();
        let json =
            serde_json::to_string_pretty(&webhooks).context("Failed to serialize snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot: {:?}", path))?;
        Ok(())
    }
}

fn build_client() -> Client {
    Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client: {}", e);
            Client::new()
        })
}

/// Single delivery attempt. Success is any 2xx; failures are logged and
/// dropped.
async fn deliver(client: &Client, url: &str, body: Vec<u8>) {
    let result = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::debug!("Webhook delivered to {}", url);
        }
        Ok(response) => {
            tracing::warn!(
                "Webhook delivery to {} returned non-success status {}",
                url,
                response.status()
            );
        }
        Err(e) => {
            tracing::warn!("Failed to deliver webhook to {}: {}", url, e);
        }
    }
}
