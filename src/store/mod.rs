//! In-memory video metadata store with JSON snapshot persistence.
//!
//! The primary id map, the name index, and the latest pointer are mutated
//! together under one write lock; lookups return defensive clones. Every
//! mutation requests an asynchronous snapshot through [`crate::persist`].

use crate::persist::{self, Snapshot, SnapshotHandle};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Metadata describing one stored media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl Video {
    pub fn new(id: String, name: String, size: u64, content_type: String) -> Self {
        let now = Utc::now();
        let url = format!("/api/videos/{}", id);
        Self {
            id,
            name,
            size,
            content_type,
            created_at: now,
            updated_at: now,
            url,
        }
    }
}

struct StoreInner {
    videos: HashMap<String, Video>,
    name_index: HashMap<String, String>,
    latest_id: Option<String>,
}

/// Concurrency-safe metadata store.
pub struct VideoStore {
    inner: RwLock<StoreInner>,
    db_path: Option<PathBuf>,
    snapshot: OnceLock<SnapshotHandle>,
}

/// On-disk dump. The name index and latest id are redundant with the
/// record list; on load the records are ground truth and the index is
/// rebuilt from them, so a torn write cannot leave the store pointing at
/// records that do not exist.
#[derive(Serialize, Deserialize)]
struct VideoStoreSnapshot {
    videos: Vec<Video>,
    name_index: HashMap<String, String>,
    latest_id: Option<String>,
}

impl VideoStore {
    /// Create a store backed by a snapshot file. Existing state is loaded
    /// from disk; subsequent mutations rewrite it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(db_path: PathBuf) -> Arc<Self> {
        let store = Arc::new(Self {
            inner: RwLock::new(StoreInner {
                videos: HashMap::new(),
                name_index: HashMap::new(),
                latest_id: None,
            }),
            db_path: Some(db_path),
            snapshot: OnceLock::new(),
        });

        if let Err(e) = store.load_from_disk() {
            tracing::warn!("Failed to load video store snapshot: {:#}", e);
        }

        let handle = persist::spawn_snapshot_writer(&store);
        let _ = store.snapshot.set(handle);

        store
    }

    /// Create a store with no persistence (tests).
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(StoreInner {
                videos: HashMap::new(),
                name_index: HashMap::new(),
                latest_id: None,
            }),
            db_path: None,
            snapshot: OnceLock::new(),
        })
    }

    /// Insert a record. The caller guarantees id uniqueness (ids are
    /// generated at ingest); on a display-name collision the name index
    /// follows the newer record.
    pub fn insert(&self, video: Video) {
        {
            let mut inner = self.inner.write();
            inner.name_index.insert(video.name.clone(), video.id.clone());
            inner.latest_id = Some(video.id.clone());
            inner.videos.insert(video.id.clone(), video);
        }
        self.request_snapshot();
    }

    pub fn get_by_id(&self, id: &str) -> Option<Video> {
        let inner = self.inner.read();
        inner.videos.get(id).cloned()
    }

    /// Look up through the name index. A stale index entry pointing at a
    /// since-deleted id degrades to `None`.
    pub fn get_by_name(&self, name: &str) -> Option<Video> {
        let inner = self.inner.read();
        let id = inner.name_index.get(name)?;
        inner.videos.get(id).cloned()
    }

    /// The most recently inserted record, or `None` if the store is empty.
    pub fn get_latest(&self) -> Option<Video> {
        let inner = self.inner.read();
        let id = inner.latest_id.as_ref()?;
        inner.videos.get(id).cloned()
    }

    /// Remove a record from both maps. Returns `false` if the id was
    /// absent. Deleting the latest record re-derives the pointer by scan.
    pub fn delete(&self, id: &str) -> bool {
        {
            let mut inner = self.inner.write();
            let Some(video) = inner.videos.remove(id) else {
                return false;
            };
            inner.name_index.remove(&video.name);

            if inner.latest_id.as_deref() == Some(id) {
                inner.latest_id = derive_latest(&inner.videos);
            }
        }
        self.request_snapshot();
        true
    }

    /// All records as defensive clones, in unspecified order.
    pub fn list_all(&self) -> Vec<Video> {
        let inner = self.inner.read();
        inner.videos.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().videos.is_empty()
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

        let doc: VideoStoreSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {:?}", path))?;

        let mut videos = HashMap::with_capacity(doc.videos.len());
        let mut name_index = HashMap::with_capacity(doc.videos.len());
        for video in doc.videos {
            name_index.insert(video.name.clone(), video.id.clone());
            videos.insert(video.id.clone(), video);
        }

        // Trust the stored latest pointer only if it still resolves.
        let latest_id = match doc.latest_id {
            Some(id) if videos.contains_key(&id) => Some(id),
            _ => derive_latest(&videos),
        };

        let count = videos.len();
        let mut inner = self.inner.write();
        inner.videos = videos;
        inner.name_index = name_index;
        inner.latest_id = latest_id;
        drop(inner);

        tracing::info!("Loaded {} videos from snapshot", count);
        Ok(())
    }
}

impl Snapshot for VideoStore {
    fn label(&self) -> &'static str {
        "video store"
    }

    fn write_snapshot(&self) -> Result<()> {
        let Some(ref path) = self.db_path else {
            return Ok(());
        };

        let doc = {
            let inner = self.inner.read();
            VideoStoreSnapshot {
                videos: inner.videos.values().cloned().collect(),
                name_index: inner.name_index.clone(),
                latest_id: inner.latest_id.clone(),
            }
        };

        let json = serde_json::to_string_pretty(&doc).context("Failed to serialize snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot: {:?}", path))?;
        Ok(())
    }
}

/// Scan for the record with the maximum creation timestamp. Ties on the
/// timestamp break toward the lexicographically smallest id, so the result
/// is deterministic for a fixed set of records.
fn derive_latest(videos: &HashMap<String, Video>) -> Option<String> {
    let mut best: Option<&Video> = None;
    for video in videos.values() {
        let replace = match best {
            None => true,
            Some(b) => {
                video.created_at > b.created_at
                    || (video.created_at == b.created_at && video.id < b.id)
            }
        };
        if replace {
            best = Some(video);
        }
    }
    best.map(|v| v.id.clone())
}
