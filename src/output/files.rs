//! Filesystem item sink
//!
//! Layout under the root directory:
//!
//! - `images/<id>.jpg`
//! - `json/<id>.json` (always `.json` locally, whatever the remote extension)
//!
//! Writes go to a temporary sibling first and are renamed into place, so an
//! interrupted download never leaves a partial file that later looks cached.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{ArtifactKind, ItemSink, OutputError, OutputResult, WriteOutcome};

/// Image subdirectory
pub const IMAGES_DIR: &str = "images";
/// Metadata subdirectory
pub const JSON_DIR: &str = "json";

/// Item sink rooted at a directory
#[derive(Debug, Clone)]
pub struct FsItemSink {
    root: PathBuf,
}

impl FsItemSink {
    /// Sink rooted at `root`; directories are created on first write
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Destination path for an artifact
    pub fn path_for(&self, kind: ArtifactKind, id: u64) -> PathBuf {
        match kind {
            ArtifactKind::Image => self.root.join(IMAGES_DIR).join(format!("{id}.jpg")),
            ArtifactKind::Metadata => self.root.join(JSON_DIR).join(format!("{id}.json")),
        }
    }

    fn write_atomic(&self, kind: ArtifactKind, id: u64, bytes: &[u8]) -> OutputResult<WriteOutcome> {
        let path = self.path_for(kind, id);
        if path.exists() {
            return Ok(WriteOutcome::Cached);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let tmp = path.with_extension("part");
        std::fs::write(&tmp, bytes)
            .map_err(|e| OutputError::IoError(format!("Failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            OutputError::IoError(format!("Failed to move {} into place: {e}", path.display()))
        })?;

        Ok(WriteOutcome::Written)
    }
}

impl ItemSink for FsItemSink {
    fn exists(&self, kind: ArtifactKind, id: u64) -> bool {
        self.path_for(kind, id).exists()
    }

    fn write_binary(&self, id: u64, bytes: &[u8]) -> OutputResult<WriteOutcome> {
        self.write_atomic(ArtifactKind::Image, id, bytes)
    }

    fn write_json(&self, id: u64, value: &Value) -> OutputResult<WriteOutcome> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        self.write_atomic(ArtifactKind::Metadata, id, &body)
    }

    fn location(&self) -> PathBuf {
        self.root.clone()
    }
}
