//! Filesystem storage for uploaded media.
//!
//! Files live flat under the storage root as `{id}_{sanitized_name}`.
//! Names are sanitized once at ingest; read paths trust the stored name.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Longest accepted filename in bytes; longer names are truncated with
/// their extension preserved.
const MAX_FILENAME_BYTES: usize = 255;

/// Manages the on-disk layout of uploaded files.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Create the storage root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create storage root: {}", self.root.display()))
    }

    /// Filesystem path for a stored file. `name` must already be sanitized.
    pub fn file_path(&self, id: &str, name: &str) -> PathBuf {
        self.root.join(format!("{}_{}", id, name))
    }

    /// Write uploaded bytes to their storage location.
    pub async fn store(&self, id: &str, name: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(id, name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    /// Remove a stored file from disk.
    pub async fn remove(&self, id: &str, name: &str) -> Result<()> {
        let path = self.file_path(id, name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove file: {}", path.display()))
    }
}

/// Sanitize an uploaded filename for use in a storage path.
///
/// Path separators are replaced with `_` so the result can never escape
/// the storage root; over-long names are truncated to
/// [`MAX_FILENAME_BYTES`] with the extension suffix preserved.
pub fn sanitize_filename(name: &str) -> String {
    let mut name = name.replace(['/', '\\'], "_");

    if name.len() > MAX_FILENAME_BYTES {
        let ext = match name.rfind('.') {
            Some(idx) => name[idx..].to_string(),
            None => String::new(),
        };
        let keep = MAX_FILENAME_BYTES.saturating_sub(ext.len());
        let mut cut = keep.min(name.len());
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
        name.push_str(&ext);
    }

    name
}
