//! Best-effort snapshot persistence shared by the stores.
//!
//! Every mutation nudges a capacity-1 channel; a single background task
//! drains it and rewrites the snapshot file. A nudge that arrives while one
//! is already pending is dropped, so bursts of mutations coalesce into one
//! write of the freshest state (last write wins). Snapshot failures are
//! logged and never surface to the operation that triggered them.

use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// A store that can dump its full in-memory state to disk.
pub trait Snapshot: Send + Sync + 'static {
    /// Human-readable label used in log messages.
    fn label(&self) -> &'static str;

    /// Serialize current state and write it to the snapshot file.
    ///
    /// Takes a brief read lock to copy state, then writes without holding
    /// any lock.
    fn write_snapshot(&self) -> anyhow::Result<()>;
}

/// Handle used by a store to request an asynchronous snapshot.
#[derive(Clone)]
pub struct SnapshotHandle {
    tx: mpsc::Sender<()>,
}

impl SnapshotHandle {
    /// Request a snapshot write. Never blocks; a request that finds one
    /// already pending is absorbed by it.
    pub fn request(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Spawn the background writer for `target` and return the handle that
/// feeds it. The task holds only a weak reference, so it exits once the
/// store is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_snapshot_writer<S: Snapshot>(target: &Arc<S>) -> SnapshotHandle {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let weak: Weak<S> = Arc::downgrade(target);

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let Some(store) = weak.upgrade() else {
                break;
            };
            if let Err(e) = store.write_snapshot() {
                tracing::warn!("Failed to write {} snapshot: {:#}", store.label(), e);
            }
        }
    });

    SnapshotHandle { tx }
}
